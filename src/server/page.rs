use std::fmt::Write;

use crate::pipeline::Prediction;
use crate::records::{Category, PatientRecord};

/// What to show under the form after a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Prediction(Prediction),
    Error(String),
}

impl Outcome {
    pub fn message(&self) -> String {
        match self {
            Outcome::Prediction(p) if p.is_stroke => format!(
                "High Risk of Stroke! (Probability: {:.2}%)",
                p.probability * 100.0
            ),
            Outcome::Prediction(p) => format!(
                "Low Risk of Stroke. (Probability: {:.2}%)",
                p.probability * 100.0
            ),
            Outcome::Error(message) => message.clone(),
        }
    }

    fn css_class(&self) -> &'static str {
        match self {
            Outcome::Prediction(p) if p.is_stroke => "high",
            Outcome::Prediction(_) => "low",
            Outcome::Error(_) => "error",
        }
    }
}

const STYLE: &str = "body{font-family:sans-serif;max-width:56rem;margin:2rem auto;padding:0 1rem}\
.columns{display:grid;grid-template-columns:1fr 1fr;gap:1.5rem}\
label{display:block;margin:.6rem 0 .2rem;font-weight:600}\
input,select{width:100%;padding:.4rem}\
.actions{margin-top:1.2rem;display:flex;gap:1rem;align-items:center}\
.result{margin-top:1.5rem;padding:1rem;border-radius:.4rem}\
.high{background:#fde2e1;color:#8a1c14}.low{background:#e2f6e5;color:#1d5e2a}\
.error{background:#fff4d6;color:#6b4d00}";

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn select<T: Category>(out: &mut String, name: &str, label: &str, selected: T) {
    let _ = write!(out, "<label for=\"{name}\">{label}</label><select id=\"{name}\" name=\"{name}\">");
    for option in T::ALL {
        let mark = if *option == selected { " selected" } else { "" };
        let _ = write!(
            out,
            "<option value=\"{}\"{}>{}</option>",
            escape(option.as_str()),
            mark,
            escape(option.label())
        );
    }
    out.push_str("</select>");
}

fn number(out: &mut String, name: &str, label: &str, value: f64, min: f64, max: Option<f64>) {
    let max = max.map(|m| format!(" max=\"{}\"", m)).unwrap_or_default();
    let _ = write!(
        out,
        "<label for=\"{name}\">{label}</label>\
         <input type=\"number\" id=\"{name}\" name=\"{name}\" step=\"any\" min=\"{min}\"{max} value=\"{value}\" required>"
    );
}

/// Renders the whole page with `record` filled into the inputs.
pub fn render(record: &PatientRecord, outcome: Option<&Outcome>) -> String {
    let mut out = String::with_capacity(4096);
    let _ = write!(
        out,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>Stroke Prediction App</title><style>{STYLE}</style></head><body>\
         <h1>Stroke Prediction App</h1>\
         <p>Enter patient details to predict the probability of stroke.</p>\
         <form method=\"post\" action=\"/\"><div class=\"columns\"><div>"
    );

    select(&mut out, "gender", "Gender", record.gender);
    number(&mut out, "age", "Age", record.age, 0.0, Some(120.0));
    select(&mut out, "hypertension", "Hypertension", record.hypertension);
    select(&mut out, "heart_disease", "Heart Disease", record.heart_disease);
    select(&mut out, "ever_married", "Ever Married?", record.ever_married);

    out.push_str("</div><div>");

    select(&mut out, "work_type", "Work Type", record.work_type);
    select(&mut out, "Residence_type", "Residence Type", record.residence_type);
    number(
        &mut out,
        "avg_glucose_level",
        "Average Glucose Level",
        record.avg_glucose_level,
        0.0,
        None,
    );
    number(&mut out, "bmi", "BMI", record.bmi, 0.0, None);
    select(&mut out, "smoking_status", "Smoking Status", record.smoking_status);

    out.push_str(
        "</div></div><div class=\"actions\"><button type=\"submit\">Predict</button>\
         <a href=\"/?sample=true\">Load sample data</a><a href=\"/\">Reset</a></div></form>",
    );

    if let Some(outcome) = outcome {
        let _ = write!(
            out,
            "<div class=\"result {}\" role=\"status\">{}</div>",
            outcome.css_class(),
            escape(&outcome.message())
        );
    }

    out.push_str("</body></html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RiskLevel;

    #[test]
    fn test_messages() {
        let high = Outcome::Prediction(Prediction {
            is_stroke: true,
            probability: 0.8312,
            risk_level: RiskLevel::High,
        });
        assert_eq!(high.message(), "High Risk of Stroke! (Probability: 83.12%)");

        let low = Outcome::Prediction(Prediction {
            is_stroke: false,
            probability: 0.04,
            risk_level: RiskLevel::Low,
        });
        assert_eq!(low.message(), "Low Risk of Stroke. (Probability: 4.00%)");
    }

    #[test]
    fn test_render_has_ten_inputs() {
        let html = render(&PatientRecord::default(), None);
        let fields = html.matches("<select").count() + html.matches("<input").count();
        assert_eq!(fields, 10);
        assert!(!html.contains("class=\"result"));
    }

    #[test]
    fn test_render_preselects_record() {
        let html = render(&PatientRecord::sample(), None);
        assert!(html.contains("<option value=\"formerly smoked\" selected>"));
        assert!(html.contains("value=\"228.69\""));
    }

    #[test]
    fn test_error_is_escaped() {
        let outcome = Outcome::Error("<script>".to_string());
        let html = render(&PatientRecord::default(), Some(&outcome));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
