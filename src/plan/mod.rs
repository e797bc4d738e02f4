//! Plan files
//!
//! A plan file carries a primitive tree in declarative JSON form plus the
//! bind variables of the call:
//!
//! ```json
//! {
//!   "bind_vars": { "id": 5 },
//!   "plan": { "type": "route", "opcode": "EqualUnique", "keyspace": "user",
//!             "query": "select * from user where id = :id",
//!             "vindex": "numeric", "values": [{ "bind_var": "id" }] }
//! }
//! ```

mod spec;

use serde::{Deserialize, Serialize};

use crate::sqltypes::BindVars;

pub use spec::{PlanSpec, RouteSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFile {
    #[serde(default)]
    pub bind_vars: BindVars,
    pub plan: PlanSpec,
}

impl PlanFile {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
