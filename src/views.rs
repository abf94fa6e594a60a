//! HTML pages for the form workflow
//!
//! Jinja templates under `templates/`, compiled into the binary and
//! auto-escaped by file extension.

use std::collections::HashMap;
use std::sync::Arc;

use axum::response::Html;
use minijinja::{context, Environment};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::inference::{ValidationError, FEATURE_NAMES};
use crate::models::PredictionRecord;

const TEMPLATES: [(&str, &str); 3] = [
    ("layout.html", include_str!("../templates/layout.html")),
    ("input_form.html", include_str!("../templates/input_form.html")),
    ("result.html", include_str!("../templates/result.html")),
];

#[derive(Serialize)]
struct FieldView<'a> {
    name: &'a str,
    label: String,
    value: &'a str,
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct RowView {
    label: String,
    value: String,
}

fn label_for(field: &str) -> String {
    let mut label = field.replace('_', " ");
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    format!("{label} (cm)")
}

/// Compiled page templates, shared by every handler.
#[derive(Clone)]
pub struct Templates {
    env: Arc<Environment<'static>>,
}

impl Templates {
    /// Parse every template; a syntax error stops startup.
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env: Arc::new(env) })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> AppResult<Html<String>> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .map(Html)
            .map_err(|e| AppError::InternalError(format!("failed to render {name}: {e}")))
    }

    /// Input form. `previous` refills the fields after a failed submission.
    pub fn input_form(
        &self,
        previous: &HashMap<String, String>,
        errors: Option<&ValidationError>,
    ) -> AppResult<Html<String>> {
        let fields: Vec<FieldView> = FEATURE_NAMES
            .iter()
            .map(|&name| FieldView {
                name,
                label: label_for(name),
                value: previous.get(name).map(String::as_str).unwrap_or(""),
                error: errors.and_then(|e| e.message_for(name)),
            })
            .collect();

        self.render(
            "input_form.html",
            context! {
                fields => fields,
                body_error => errors.and_then(|e| e.message_for("body")),
            },
        )
    }

    /// Result page for a committed prediction.
    pub fn result_page(&self, record: &PredictionRecord, species: Option<&str>) -> AppResult<Html<String>> {
        let rows: Vec<RowView> = FEATURE_NAMES
            .iter()
            .zip(record.inputs().features())
            .map(|(name, value)| RowView {
                label: label_for(name),
                value: value.to_string(),
            })
            .collect();

        self.render(
            "result.html",
            context! {
                rows => rows,
                prediction => record.prediction,
                species => species,
                id => record.id,
                created_at => record.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::validate::{FieldIssue, IssueKind};
    use chrono::Utc;

    fn templates() -> Templates {
        Templates::new().unwrap()
    }

    #[test]
    fn test_label_for() {
        assert_eq!(label_for("sepal_length"), "Sepal length (cm)");
    }

    #[test]
    fn test_input_form_has_every_field() {
        let Html(page) = templates().input_form(&HashMap::new(), None).unwrap();
        for name in FEATURE_NAMES {
            assert!(page.contains(&format!("name=\"{name}\"")));
        }
        assert!(page.contains("action=\"/predict\""));
        assert!(page.contains("href=\"/static/style.css\""));
        assert!(!page.contains("class=\"error\""));
    }

    #[test]
    fn test_input_form_shows_errors_and_escapes_values() {
        let previous: HashMap<String, String> =
            [("sepal_length".to_string(), "\"><script>".to_string())].into_iter().collect();
        let errors = ValidationError {
            issues: vec![FieldIssue::new("sepal_length", IssueKind::NotANumber)],
        };

        let Html(page) = templates().input_form(&previous, Some(&errors)).unwrap();
        assert!(page.contains("value is not a valid number"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn test_input_form_body_error() {
        let errors = ValidationError {
            issues: vec![FieldIssue::with_message("body", "Failed to deserialize form")],
        };
        let Html(page) = templates().input_form(&HashMap::new(), Some(&errors)).unwrap();
        assert!(page.contains("<p class=\"error\">Failed to deserialize form</p>"));
    }

    #[test]
    fn test_result_page() {
        let record = PredictionRecord {
            id: 42,
            sepal_length: 6.3,
            sepal_width: 3.3,
            petal_length: 6.0,
            petal_width: 2.5,
            prediction: 2,
            created_at: Utc::now(),
        };
        let Html(page) = templates().result_page(&record, Some("virginica")).unwrap();
        assert!(page.contains("<td>6.3</td>"));
        assert!(page.contains("<td>2.5</td>"));
        assert!(page.contains("<strong>2</strong> (virginica)"));
        assert!(page.contains("Record #42"));
        assert!(page.contains("<title>Prediction result</title>"));
    }

    #[test]
    fn test_result_page_without_species() {
        let record = PredictionRecord {
            id: 7,
            sepal_length: 5.1,
            sepal_width: 3.5,
            petal_length: 1.4,
            petal_width: 0.2,
            prediction: 0,
            created_at: Utc::now(),
        };
        let Html(page) = templates().result_page(&record, None).unwrap();
        assert!(page.contains("<strong>0</strong></p>"));
    }
}
