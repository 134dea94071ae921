//! Column schema of the stroke dataset and the typed patient record the
//! predictor builds from user input.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use polars::prelude::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StrokeError};

pub const ID_COLUMN: &str = "id";
pub const LABEL_COLUMN: &str = "stroke";

/// Numeric branch columns, in the order they appear in the feature vector.
pub const NUMERIC_FEATURES: [&str; 3] = ["age", "avg_glucose_level", "bmi"];

/// Categorical branch columns, in the order their indicator blocks appear.
pub const CATEGORICAL_FEATURES: [&str; 7] = [
    "gender",
    "hypertension",
    "heart_disease",
    "ever_married",
    "work_type",
    "Residence_type",
    "smoking_status",
];

pub struct StrokeRecord {}

impl StrokeRecord {
    /// Dtypes used when reading the raw CSV. `bmi` is read as text because the
    /// public dataset writes `N/A` for missing values.
    pub fn raw_schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(ID_COLUMN, DataType::Int64),
            Field::new("gender", DataType::Utf8),
            Field::new("age", DataType::Float64),
            Field::new("hypertension", DataType::Int32),
            Field::new("heart_disease", DataType::Int32),
            Field::new("ever_married", DataType::Utf8),
            Field::new("work_type", DataType::Utf8),
            Field::new("Residence_type", DataType::Utf8),
            Field::new("avg_glucose_level", DataType::Float64),
            Field::new("bmi", DataType::Utf8),
            Field::new("smoking_status", DataType::Utf8),
            Field::new(LABEL_COLUMN, DataType::Int32),
        ])
    }

    /// Every column the trainer needs besides the row identifier.
    pub fn required_columns() -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = NUMERIC_FEATURES.to_vec();
        columns.extend_from_slice(&CATEGORICAL_FEATURES);
        columns.push(LABEL_COLUMN);
        columns
    }
}

/// A closed vocabulary column.
pub trait Category: Sized + Copy + PartialEq + 'static {
    const ALL: &'static [Self];

    /// Token as it appears in the dataset.
    fn as_str(&self) -> &'static str;

    /// Human readable label for the form.
    fn label(&self) -> &'static str;
}

macro_rules! category {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $token:literal, $label:literal;)+ }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl Category for $name {
            const ALL: &'static [$name] = &[$($name::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }

            fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = StrokeError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($token => Ok($name::$variant),)+
                    other => Err(StrokeError::InvalidInput(format!(
                        "unknown {} value {:?}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

category! {
    Gender {
        Male => "Male", "Male";
        Female => "Female", "Female";
        Other => "Other", "Other";
    }
}

category! {
    /// 0/1 indicator stored as a categorical token.
    BinaryFlag {
        No => "0", "No";
        Yes => "1", "Yes";
    }
}

category! {
    YesNo {
        Yes => "Yes", "Yes";
        No => "No", "No";
    }
}

category! {
    WorkType {
        Private => "Private", "Private";
        SelfEmployed => "Self-employed", "Self-employed";
        GovtJob => "Govt_job", "Govt Job";
        Children => "children", "Children";
        NeverWorked => "Never_worked", "Never Worked";
    }
}

category! {
    ResidenceType {
        Urban => "Urban", "Urban";
        Rural => "Rural", "Rural";
    }
}

category! {
    SmokingStatus {
        FormerlySmoked => "formerly smoked", "Formerly Smoked";
        NeverSmoked => "never smoked", "Never Smoked";
        Smokes => "smokes", "Smokes";
        Unknown => "Unknown", "Unknown";
    }
}

/// One patient as entered in the form. Field names match the CSV header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub gender: Gender,
    pub age: f64,
    pub hypertension: BinaryFlag,
    pub heart_disease: BinaryFlag,
    pub ever_married: YesNo,
    pub work_type: WorkType,
    #[serde(rename = "Residence_type")]
    pub residence_type: ResidenceType,
    pub avg_glucose_level: f64,
    pub bmi: f64,
    pub smoking_status: SmokingStatus,
}

impl Default for PatientRecord {
    fn default() -> Self {
        PatientRecord {
            gender: Gender::Male,
            age: 30.0,
            hypertension: BinaryFlag::No,
            heart_disease: BinaryFlag::No,
            ever_married: YesNo::Yes,
            work_type: WorkType::Private,
            residence_type: ResidenceType::Urban,
            avg_glucose_level: 100.0,
            bmi: 25.0,
            smoking_status: SmokingStatus::NeverSmoked,
        }
    }
}

impl PatientRecord {
    /// Patient used by the "Load sample data" action.
    pub fn sample() -> Self {
        PatientRecord {
            gender: Gender::Male,
            age: 67.0,
            hypertension: BinaryFlag::No,
            heart_disease: BinaryFlag::Yes,
            ever_married: YesNo::Yes,
            work_type: WorkType::Private,
            residence_type: ResidenceType::Urban,
            avg_glucose_level: 228.69,
            bmi: 36.6,
            smoking_status: SmokingStatus::FormerlySmoked,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.age.is_finite() || !(0.0..=120.0).contains(&self.age) {
            return Err(StrokeError::InvalidInput(format!(
                "age {} out of range [0, 120]",
                self.age
            )));
        }
        if !self.avg_glucose_level.is_finite() || self.avg_glucose_level < 0.0 {
            return Err(StrokeError::InvalidInput(format!(
                "average glucose level {} must be a non-negative number",
                self.avg_glucose_level
            )));
        }
        if !self.bmi.is_finite() || self.bmi < 0.0 {
            return Err(StrokeError::InvalidInput(format!(
                "bmi {} must be a non-negative number",
                self.bmi
            )));
        }
        Ok(())
    }

    /// Overwrites every field that parses from the submitted form values.
    /// Missing or malformed fields keep their current value and are listed in
    /// the returned error.
    pub fn update_from_fields(&mut self, fields: &HashMap<String, String>) -> Result<()> {
        let mut problems = Vec::new();
        parse_field(fields, "gender", &mut self.gender, &mut problems);
        parse_field(fields, "age", &mut self.age, &mut problems);
        parse_field(fields, "hypertension", &mut self.hypertension, &mut problems);
        parse_field(fields, "heart_disease", &mut self.heart_disease, &mut problems);
        parse_field(fields, "ever_married", &mut self.ever_married, &mut problems);
        parse_field(fields, "work_type", &mut self.work_type, &mut problems);
        parse_field(fields, "Residence_type", &mut self.residence_type, &mut problems);
        parse_field(
            fields,
            "avg_glucose_level",
            &mut self.avg_glucose_level,
            &mut problems,
        );
        parse_field(fields, "bmi", &mut self.bmi, &mut problems);
        parse_field(fields, "smoking_status", &mut self.smoking_status, &mut problems);

        if problems.is_empty() {
            Ok(())
        } else {
            Err(StrokeError::InvalidInput(problems.join("; ")))
        }
    }

    pub fn to_feature_row(&self) -> FeatureRow {
        FeatureRow {
            numeric: [Some(self.age), Some(self.avg_glucose_level), Some(self.bmi)],
            categorical: [
                Some(self.gender.as_str().to_string()),
                Some(self.hypertension.as_str().to_string()),
                Some(self.heart_disease.as_str().to_string()),
                Some(self.ever_married.as_str().to_string()),
                Some(self.work_type.as_str().to_string()),
                Some(self.residence_type.as_str().to_string()),
                Some(self.smoking_status.as_str().to_string()),
            ],
        }
    }
}

fn parse_field<T>(
    fields: &HashMap<String, String>,
    name: &str,
    slot: &mut T,
    problems: &mut Vec<String>,
) where
    T: FromStr,
    T::Err: fmt::Display,
{
    match fields.get(name).map(|v| v.trim()) {
        None | Some("") => problems.push(format!("missing field {}", name)),
        Some(raw) => match raw.parse() {
            Ok(value) => *slot = value,
            Err(e) => problems.push(format!("{}: {}", name, e)),
        },
    }
}

/// Untyped row as the preprocessor sees it. Slots follow `NUMERIC_FEATURES`
/// and `CATEGORICAL_FEATURES`; `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureRow {
    pub numeric: [Option<f64>; 3],
    pub categorical: [Option<String>; 7],
}
