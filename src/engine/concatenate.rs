//! Parallel union of sibling primitives

use std::collections::{BTreeSet, HashSet};
use std::sync::mpsc;
use std::thread;

use super::context::ExecContext;
use super::cursor::VCursor;
use super::errors::{EngineError, EngineResult};
use super::primitive::{Primitive, PrimitiveDescription};
use crate::observability::{log_event_at, Event, Severity};
use crate::sqltypes::{BindVars, Field, ResultSet};

/// Runs every source concurrently and appends their rows in source order.
///
/// Sources must agree on the number of fields and, except for positions in
/// `no_need_to_type_check`, on their types.
#[derive(Debug)]
pub struct Concatenate {
    pub sources: Vec<Box<dyn Primitive>>,
    /// Positions whose types may differ between sources, e.g. weight strings
    pub no_need_to_type_check: HashSet<usize>,
}

impl Concatenate {
    pub fn new(sources: Vec<Box<dyn Primitive>>) -> Self {
        Self {
            sources,
            no_need_to_type_check: HashSet::new(),
        }
    }

    pub fn with_unchecked_types(mut self, positions: impl IntoIterator<Item = usize>) -> Self {
        self.no_need_to_type_check.extend(positions);
        self
    }

    /// Executes all sources, one thread each.
    ///
    /// Results land in slots indexed by source position. The first error
    /// received wins; the other sources still run to completion.
    fn exec_sources(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<Vec<ResultSet>> {
        let sources = self.sources.len().to_string();
        let request_id = ctx.request_id_str();
        log_event_at(
            Severity::Trace,
            Event::ConcatenateFanout,
            &[("sources", sources.as_str()), ("request_id", request_id.as_str())],
        );

        let mut slots: Vec<Option<ResultSet>> = (0..self.sources.len()).map(|_| None).collect();
        let mut first_error: Option<EngineError> = None;

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<(usize, EngineResult<ResultSet>)>();
            let handles: Vec<_> = self
                .sources
                .iter()
                .enumerate()
                .map(|(i, source)| {
                    let tx = tx.clone();
                    // Each source reads its own copy of the bind variables
                    let vars = bind_vars.clone();
                    scope.spawn(move || {
                        let result = source.execute(ctx, cursor, &vars, want_fields);
                        // The receiver outlives every sender inside the scope
                        let _ = tx.send((i, result));
                    })
                })
                .collect();
            drop(tx);

            for (i, result) in rx {
                match result {
                    Ok(rs) => slots[i] = Some(rs),
                    Err(err) => {
                        let index = i.to_string();
                        let message = err.to_string();
                        log_event_at(
                            Severity::Warn,
                            Event::ConcatenateSourceFailed,
                            &[
                                ("source", index.as_str()),
                                ("error", message.as_str()),
                                ("request_id", request_id.as_str()),
                            ],
                        );
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                }
            }

            for handle in handles {
                if handle.join().is_err() && first_error.is_none() {
                    first_error = Some(EngineError::internal("concatenate source panicked"));
                }
            }
        });

        if let Some(err) = first_error {
            return Err(err);
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| {
                    EngineError::internal(format!("concatenate source {} returned no result", i))
                })
            })
            .collect()
    }

    /// Fields of the first source that has any; all others must match them
    fn merged_fields(&self, results: &[ResultSet]) -> EngineResult<Vec<Field>> {
        let mut fields: Option<&[Field]> = None;
        for result in results {
            if result.fields.is_empty() {
                continue;
            }
            match fields {
                None => fields = Some(&result.fields),
                Some(first) => self.compare_fields(first, &result.fields)?,
            }
        }
        Ok(fields.map(|f| f.to_vec()).unwrap_or_default())
    }

    fn compare_fields(&self, first: &[Field], other: &[Field]) -> EngineResult<()> {
        if first.len() != other.len() {
            return Err(EngineError::type_mismatch(format!(
                "The used SELECT statements have a different number of columns: {} vs {}",
                first.len(),
                other.len()
            )));
        }
        for (i, (a, b)) in first.iter().zip(other).enumerate() {
            if self.no_need_to_type_check.contains(&i) {
                continue;
            }
            if a.sql_type != b.sql_type {
                return Err(EngineError::type_mismatch(format!(
                    "merging field of different types is not supported, name: ({}, {}) types: ({}, {})",
                    a.name, b.name, a.sql_type, b.sql_type
                )));
            }
        }
        Ok(())
    }
}

impl Primitive for Concatenate {
    fn operator_type(&self) -> &'static str {
        "Concatenate"
    }

    fn execute(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
        want_fields: bool,
    ) -> EngineResult<ResultSet> {
        let results = self.exec_sources(ctx, cursor, bind_vars, want_fields)?;
        let fields = self.merged_fields(&results)?;

        let mut combined = ResultSet::fields_only(fields);
        for result in results {
            combined.rows.extend(result.rows);
            combined.rows_affected += result.rows_affected;
        }
        Ok(combined)
    }

    fn get_fields(
        &self,
        ctx: &ExecContext,
        cursor: &dyn VCursor,
        bind_vars: &BindVars,
    ) -> EngineResult<ResultSet> {
        let results = self
            .sources
            .iter()
            .map(|source| source.get_fields(ctx, cursor, bind_vars))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(ResultSet::fields_only(self.merged_fields(&results)?))
    }

    fn needs_transaction(&self) -> bool {
        self.sources.iter().any(|s| s.needs_transaction())
    }

    fn inputs(&self) -> Vec<&dyn Primitive> {
        self.sources.iter().map(|s| s.as_ref()).collect()
    }

    fn description(&self) -> PrimitiveDescription {
        let mut desc = PrimitiveDescription::new(self.operator_type(), "");
        if !self.no_need_to_type_check.is_empty() {
            let positions: BTreeSet<usize> = self.no_need_to_type_check.iter().copied().collect();
            desc = desc.with("NoNeedToTypeCheck", positions);
        }
        desc
    }
}
