use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{ConstraintConfig, Entities, Timetable};

/// Body of a generation request: the school's entities plus the
/// constraint set. A missing `config` means all defaults.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct GenerateRequest {
    pub entities: Entities,
    #[serde(default)]
    pub config: ConstraintConfig,
}

/// Body of an explain request: an existing timetable to re-check.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ExplainRequest {
    pub entities: Entities,
    #[serde(default)]
    pub config: ConstraintConfig,
    pub timetable: Timetable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_is_optional() {
        let req: GenerateRequest = serde_json::from_value(serde_json::json!({
            "entities": {
                "school": {
                    "id": "s1",
                    "name": "Hillside",
                    "days": ["mon", "tuesday"],
                    "periods": [{ "id": "p1", "start": "08:00", "end": "08:45" }]
                }
            }
        }))
        .unwrap();
        assert_eq!(req.config, ConstraintConfig::default());
        assert_eq!(req.entities.school.periods[0].start.to_string(), "08:00");
        assert!(req.entities.subjects.is_empty());
    }
}
