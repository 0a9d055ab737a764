use crate::occasions::{Occasion, OccasionList};
use chrono::NaiveDate;
use minijinja::value::{Object, Value};
use std::sync::Arc;

// Any leap year works, it only anchors month and day for formatting.
const DISPLAY_YEAR: i32 = 2000;

impl Object for Occasion {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let value = match key.as_str()? {
            "name" => Value::from(self.name.clone()),
            "kind" => Value::from(self.kind.as_str()),
            "month" => Value::from(self.month),
            "day" => Value::from(self.day),
            "date" => {
                let date = NaiveDate::from_ymd_opt(DISPLAY_YEAR, self.month, self.day)?;
                Value::from(date.format("%-d %B").to_string())
            }
            _ => return None,
        };

        Some(value)
    }
}

impl OccasionList {
    /// Converts the occasions into values for use in templates.
    pub fn to_template_values(&self) -> Vec<Value> {
        self.iter().cloned().map(Value::from_object).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occasions::OccasionKind;

    fn render(occasion: Occasion, template: &str) -> String {
        let env = minijinja::Environment::new();
        env.render_str(template, minijinja::context! { o => Value::from_object(occasion) })
            .unwrap()
    }

    #[test]
    fn occasion_fields() {
        let occasion = Occasion {
            name: "Jane".into(),
            month: 3,
            day: 5,
            kind: OccasionKind::Birthday,
        };

        assert_eq!(
            render(occasion, "{{ o.name }}|{{ o.kind }}|{{ o.date }}|{{ o.month }}/{{ o.day }}"),
            "Jane|birthday|5 March|3/5"
        );
    }

    #[test]
    fn leap_day_is_formatted() {
        let occasion = Occasion {
            name: "Leap".into(),
            month: 2,
            day: 29,
            kind: OccasionKind::Anniversary,
        };

        assert_eq!(render(occasion, "{{ o.date }} {{ o.kind }}"), "29 February anniversary");
    }
}
