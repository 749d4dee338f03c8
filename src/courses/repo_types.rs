use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// One week of a course outline, kept in its wire shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Week {
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub week_number: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_title: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mini_project: Option<String>,
}

/// Accepts a JSON number or a numeric string; blank strings and `null` are
/// treated as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<Number>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Some(i.into()));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid week number: {s:?}")))
        }
        Some(other) => Err(de::Error::custom(format!(
            "week number must be a number, got {other}"
        ))),
    }
}

#[derive(Debug, FromRow)]
pub struct CourseRow {
    pub id: Uuid,
    pub image: String,
    pub title: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub popular: bool,
    pub outline: Json<Vec<Week>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub image: String,
    pub title: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub popular: bool,
    pub outline: Vec<Week>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<CourseRow> for Course {
    fn from(r: CourseRow) -> Self {
        Self {
            id: r.id,
            image: r.image,
            title: r.title,
            duration: r.duration,
            description: r.description,
            popular: r.popular,
            outline: r.outline.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub image: String,
    pub title: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub popular: bool,
    pub outline: Vec<Week>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct CourseChanges {
    pub image: Option<String>,
    pub title: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub popular: Option<bool>,
    pub outline: Option<Vec<Week>>,
}
