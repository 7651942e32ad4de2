use finscope_protocol::{StepProgress, StepStatus};

pub const STEP_INTENT: &str = "Intent Recognition";
pub const STEP_STOCK_VALIDATION: &str = "Stock Validation";
pub const STEP_DATA_FETCH: &str = "Data Fetch";
pub const STEP_ANALYSIS: &str = "Analysis";
pub const STEP_MODEL_PREDICTION: &str = "Model Prediction";
pub const STEP_REPORT_GENERATION: &str = "Report Generation";
pub const STEP_INFO_RETRIEVAL: &str = "Information Retrieval";
pub const STEP_GENERATE_ANSWER: &str = "Generate Answer";

/// Per-intent step schedule (1 / 3 / 4 / 6 steps), ported from
/// `get_steps_for_intent` in `step_definitions.py`: out-of-scope gets a
/// single step, a forecast always gets the full six, and a plain chat
/// gets three or four depending on whether a stock was mentioned.
pub fn step_schedule(is_in_scope: bool, is_forecast: bool, has_stock: bool) -> Vec<StepProgress> {
    let names: &[&str] = if !is_in_scope {
        &[STEP_INTENT]
    } else if is_forecast {
        &[
            STEP_INTENT,
            STEP_STOCK_VALIDATION,
            STEP_DATA_FETCH,
            STEP_ANALYSIS,
            STEP_MODEL_PREDICTION,
            STEP_REPORT_GENERATION,
        ]
    } else if has_stock {
        &[
            STEP_INTENT,
            STEP_STOCK_VALIDATION,
            STEP_INFO_RETRIEVAL,
            STEP_GENERATE_ANSWER,
        ]
    } else {
        &[STEP_INTENT, STEP_INFO_RETRIEVAL, STEP_GENERATE_ANSWER]
    };

    names
        .iter()
        .enumerate()
        .map(|(i, name)| StepProgress {
            step: (i + 1) as u32,
            name: name.to_string(),
            status: StepStatus::Pending,
        })
        .collect()
}

pub fn step_count(is_in_scope: bool, is_forecast: bool, has_stock: bool) -> usize {
    step_schedule(is_in_scope, is_forecast, has_stock).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_scope_has_one_step() {
        assert_eq!(step_count(false, false, false), 1);
    }

    #[test]
    fn forecast_always_gets_six_steps_regardless_of_stock() {
        assert_eq!(step_count(true, true, true), 6);
        assert_eq!(step_count(true, true, false), 6);
    }

    #[test]
    fn chat_step_count_depends_on_stock_mention() {
        assert_eq!(step_count(true, false, true), 4);
        assert_eq!(step_count(true, false, false), 3);
    }

    #[test]
    fn chat_schedules_number_steps_starting_at_one() {
        let schedule = step_schedule(true, false, false);
        assert_eq!(schedule[0].step, 1);
        assert_eq!(schedule[0].name, STEP_INTENT);
        assert_eq!(schedule[1].name, STEP_INFO_RETRIEVAL);
    }
}
