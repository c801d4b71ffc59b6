use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::OrderedPlan;

/// JSON Schema of the cached plan document.
pub fn plan_json_schema() -> RootSchema {
    schema_for!(OrderedPlan)
}
