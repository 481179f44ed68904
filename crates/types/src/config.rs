use crate::ClockTime;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Default weights and thresholds of the soft rules and the repair search.
pub mod defaults {
    use crate::ClockTime;

    /// Per pair of adjacent same-subject periods in a class-day.
    pub const BACK_TO_BACK_WEIGHT: f64 = 5.0;
    /// Per core-subject lesson starting at or after `MORNING_ENDS_AT`.
    pub const MORNING_CORE_WEIGHT: f64 = 3.0;
    /// Per isolated free period inside a teacher-day.
    pub const SINGLE_GAP_WEIGHT: f64 = 4.0;
    /// Multiplies the variance of a requirement's per-day lesson counts.
    pub const BALANCE_WEIGHT: f64 = 2.0;
    /// Per pair of adjacent difficult lessons in a class-day.
    pub const DIFFICULT_PAIR_WEIGHT: f64 = 3.0;
    /// Per period a teacher's run exceeds `MAX_CONSECUTIVE_PERIODS`.
    pub const EXCESS_CONSECUTIVE_WEIGHT: f64 = 6.0;
    pub const MAX_CONSECUTIVE_PERIODS: u32 = 3;
    pub const MORNING_ENDS_AT: ClockTime = ClockTime::NOON;

    pub const REPAIR_ITERATIONS: u32 = 200;
    /// Largest soft-penalty increase a repair move may cause.
    pub const SWAP_TOLERANCE: f64 = 25.0;
}

/// A soft rule: violations cost `weight` each while `enabled`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SoftRule {
    pub enabled: bool,
    pub weight: f64,
}

impl SoftRule {
    pub const fn on(weight: f64) -> Self {
        Self {
            enabled: true,
            weight,
        }
    }

    pub const fn off(weight: f64) -> Self {
        Self {
            enabled: false,
            weight,
        }
    }

    /// Weight when enabled, zero otherwise.
    pub fn effective(&self) -> f64 {
        if self.enabled {
            self.weight
        } else {
            0.0
        }
    }
}

/// Either field of a soft rule may be left out; the rule's own default
/// fills the gap.
#[derive(Deserialize)]
struct SoftRulePatch {
    enabled: Option<bool>,
    weight: Option<f64>,
}

impl SoftRulePatch {
    fn over(self, base: SoftRule) -> SoftRule {
        SoftRule {
            enabled: self.enabled.unwrap_or(base.enabled),
            weight: self.weight.unwrap_or(base.weight),
        }
    }
}

macro_rules! soft_rule_field {
    ($name:ident, $default:expr) => {
        pub(super) fn $name<'de, D: Deserializer<'de>>(d: D) -> Result<SoftRule, D::Error> {
            SoftRulePatch::deserialize(d).map(|p| p.over($default))
        }
    };
}

mod partial {
    use super::*;

    soft_rule_field!(back_to_back, SoftRule::on(defaults::BACK_TO_BACK_WEIGHT));
    soft_rule_field!(morning_core, SoftRule::on(defaults::MORNING_CORE_WEIGHT));
    soft_rule_field!(single_gap, SoftRule::on(defaults::SINGLE_GAP_WEIGHT));
    soft_rule_field!(balance, SoftRule::on(defaults::BALANCE_WEIGHT));
    soft_rule_field!(difficult_pair, SoftRule::off(defaults::DIFFICULT_PAIR_WEIGHT));
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(default)]
pub struct MaxConsecutiveRule {
    pub enabled: bool,
    pub weight: f64,
    pub limit: u32,
}

impl Default for MaxConsecutiveRule {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: defaults::EXCESS_CONSECUTIVE_WEIGHT,
            limit: defaults::MAX_CONSECUTIVE_PERIODS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(default)]
pub struct SearchParams {
    /// Cap on repair iterations; zero skips the repair pass.
    pub repair_iterations: u32,
    pub swap_tolerance: f64,
    /// Wall-clock budget for the repair pass. Runs that hit it are not
    /// reproducible, prefer the iteration cap.
    pub time_limit_ms: Option<u64>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            repair_iterations: defaults::REPAIR_ITERATIONS,
            swap_tolerance: defaults::SWAP_TOLERANCE,
            time_limit_ms: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(default)]
pub struct ConstraintConfig {
    pub respect_teacher_availability: bool,
    /// Always enforced; `false` is rejected.
    pub no_double_booking_teacher: bool,
    /// Always enforced; `false` is rejected.
    pub no_double_booking_room: bool,
    /// Always enforced; `false` is rejected.
    pub no_double_booking_class: bool,
    /// Reserves every break period. Needs at least one break period.
    pub lunch_break_required: bool,
    #[serde(deserialize_with = "partial::back_to_back")]
    #[schema(value_type = SoftRule)]
    #[schemars(with = "SoftRule")]
    pub no_back_to_back_same_subject: SoftRule,
    #[serde(deserialize_with = "partial::morning_core")]
    #[schema(value_type = SoftRule)]
    #[schemars(with = "SoftRule")]
    pub prefer_morning_for_core_subjects: SoftRule,
    #[serde(deserialize_with = "partial::single_gap")]
    #[schema(value_type = SoftRule)]
    #[schemars(with = "SoftRule")]
    pub avoid_single_period_gaps: SoftRule,
    #[serde(deserialize_with = "partial::balance")]
    #[schema(value_type = SoftRule)]
    #[schemars(with = "SoftRule")]
    pub balance_subjects_across_week: SoftRule,
    #[serde(deserialize_with = "partial::difficult_pair")]
    #[schema(value_type = SoftRule)]
    #[schemars(with = "SoftRule")]
    pub avoid_consecutive_difficult_subjects: SoftRule,
    pub max_consecutive_periods: MaxConsecutiveRule,
    #[schema(value_type = String, example = "12:00")]
    #[schemars(with = "String")]
    pub morning_ends_at: ClockTime,
    pub search: SearchParams,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            respect_teacher_availability: true,
            no_double_booking_teacher: true,
            no_double_booking_room: true,
            no_double_booking_class: true,
            lunch_break_required: false,
            no_back_to_back_same_subject: SoftRule::on(defaults::BACK_TO_BACK_WEIGHT),
            prefer_morning_for_core_subjects: SoftRule::on(defaults::MORNING_CORE_WEIGHT),
            avoid_single_period_gaps: SoftRule::on(defaults::SINGLE_GAP_WEIGHT),
            balance_subjects_across_week: SoftRule::on(defaults::BALANCE_WEIGHT),
            avoid_consecutive_difficult_subjects: SoftRule::off(defaults::DIFFICULT_PAIR_WEIGHT),
            max_consecutive_periods: MaxConsecutiveRule::default(),
            morning_ends_at: defaults::MORNING_ENDS_AT,
            search: SearchParams::default(),
        }
    }
}

impl ConstraintConfig {
    /// Every soft rule switched off; hard rules keep their defaults.
    pub fn hard_only() -> Self {
        let mut cfg = Self::default();
        cfg.no_back_to_back_same_subject.enabled = false;
        cfg.prefer_morning_for_core_subjects.enabled = false;
        cfg.avoid_single_period_gaps.enabled = false;
        cfg.balance_subjects_across_week.enabled = false;
        cfg.avoid_consecutive_difficult_subjects.enabled = false;
        cfg.max_consecutive_periods.enabled = false;
        cfg
    }

    /// Name and rule for each weighted soft rule.
    pub fn soft_rules(&self) -> [(&'static str, bool, f64); 6] {
        [
            (
                "no_back_to_back_same_subject",
                self.no_back_to_back_same_subject.enabled,
                self.no_back_to_back_same_subject.weight,
            ),
            (
                "prefer_morning_for_core_subjects",
                self.prefer_morning_for_core_subjects.enabled,
                self.prefer_morning_for_core_subjects.weight,
            ),
            (
                "avoid_single_period_gaps",
                self.avoid_single_period_gaps.enabled,
                self.avoid_single_period_gaps.weight,
            ),
            (
                "balance_subjects_across_week",
                self.balance_subjects_across_week.enabled,
                self.balance_subjects_across_week.weight,
            ),
            (
                "avoid_consecutive_difficult_subjects",
                self.avoid_consecutive_difficult_subjects.enabled,
                self.avoid_consecutive_difficult_subjects.weight,
            ),
            (
                "max_consecutive_periods",
                self.max_consecutive_periods.enabled,
                self.max_consecutive_periods.weight,
            ),
        ]
    }
}

/// Flat switches as saved by the constraints step of the setup wizard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(default)]
pub struct WizardConstraints {
    pub no_back_to_back_same_subject: bool,
    pub prefer_morning_for_core_subjects: bool,
    pub avoid_single_period_gaps: bool,
    pub respect_teacher_availability: bool,
    pub balance_subjects_across_week: bool,
    pub avoid_consecutive_difficult_subjects: bool,
    pub lunch_break_required: bool,
    pub max_consecutive_periods: u32,
}

impl Default for WizardConstraints {
    fn default() -> Self {
        Self {
            no_back_to_back_same_subject: true,
            prefer_morning_for_core_subjects: true,
            avoid_single_period_gaps: true,
            respect_teacher_availability: true,
            balance_subjects_across_week: true,
            avoid_consecutive_difficult_subjects: false,
            lunch_break_required: true,
            max_consecutive_periods: defaults::MAX_CONSECUTIVE_PERIODS,
        }
    }
}

impl From<WizardConstraints> for ConstraintConfig {
    fn from(w: WizardConstraints) -> Self {
        let mut cfg = ConstraintConfig {
            respect_teacher_availability: w.respect_teacher_availability,
            lunch_break_required: w.lunch_break_required,
            ..ConstraintConfig::default()
        };
        cfg.no_back_to_back_same_subject.enabled = w.no_back_to_back_same_subject;
        cfg.prefer_morning_for_core_subjects.enabled = w.prefer_morning_for_core_subjects;
        cfg.avoid_single_period_gaps.enabled = w.avoid_single_period_gaps;
        cfg.balance_subjects_across_week.enabled = w.balance_subjects_across_week;
        cfg.avoid_consecutive_difficult_subjects.enabled = w.avoid_consecutive_difficult_subjects;
        // 0 in the wizard means "no limit"
        cfg.max_consecutive_periods.enabled = w.max_consecutive_periods > 0;
        if w.max_consecutive_periods > 0 {
            cfg.max_consecutive_periods.limit = w.max_consecutive_periods;
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: ConstraintConfig = serde_json::from_value(serde_json::json!({
            "lunch_break_required": true,
            "balance_subjects_across_week": {"enabled": false, "weight": 1.5},
            "search": {"repair_iterations": 10}
        }))
        .unwrap();
        assert!(cfg.lunch_break_required);
        assert_eq!(cfg.balance_subjects_across_week, SoftRule::off(1.5));
        assert_eq!(cfg.search.repair_iterations, 10);
        assert_eq!(cfg.search.swap_tolerance, defaults::SWAP_TOLERANCE);
        assert_eq!(
            cfg.no_back_to_back_same_subject,
            SoftRule::on(defaults::BACK_TO_BACK_WEIGHT)
        );
    }

    #[test]
    fn rules_may_be_given_in_part() {
        let cfg: ConstraintConfig = serde_json::from_value(serde_json::json!({
            "no_back_to_back_same_subject": {"enabled": false},
            "avoid_single_period_gaps": {"weight": 9.0},
            "avoid_consecutive_difficult_subjects": {"enabled": true},
            "max_consecutive_periods": {"limit": 5}
        }))
        .unwrap();
        assert_eq!(
            cfg.no_back_to_back_same_subject,
            SoftRule::off(defaults::BACK_TO_BACK_WEIGHT)
        );
        assert_eq!(cfg.avoid_single_period_gaps, SoftRule::on(9.0));
        assert_eq!(
            cfg.avoid_consecutive_difficult_subjects,
            SoftRule::on(defaults::DIFFICULT_PAIR_WEIGHT)
        );
        assert_eq!(cfg.max_consecutive_periods.limit, 5);
        assert_eq!(
            cfg.max_consecutive_periods.weight,
            defaults::EXCESS_CONSECUTIVE_WEIGHT
        );
        assert_eq!(
            cfg.prefer_morning_for_core_subjects,
            SoftRule::on(defaults::MORNING_CORE_WEIGHT)
        );
    }

    #[test]
    fn wizard_flags_map_onto_rules() {
        let w = WizardConstraints {
            avoid_single_period_gaps: false,
            max_consecutive_periods: 4,
            ..WizardConstraints::default()
        };
        let cfg = ConstraintConfig::from(w);
        assert!(cfg.lunch_break_required);
        assert!(!cfg.avoid_single_period_gaps.enabled);
        assert_eq!(cfg.avoid_single_period_gaps.weight, defaults::SINGLE_GAP_WEIGHT);
        assert_eq!(cfg.max_consecutive_periods.limit, 4);
        assert!(!cfg.avoid_consecutive_difficult_subjects.enabled);
    }

    #[test]
    fn hard_only_disables_every_soft_rule() {
        let cfg = ConstraintConfig::hard_only();
        assert!(cfg.soft_rules().iter().all(|(_, on, _)| !on));
        assert!(cfg.respect_teacher_availability);
    }
}
