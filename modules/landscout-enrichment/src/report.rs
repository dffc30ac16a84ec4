use std::collections::BTreeMap;
use std::fmt;

/// Outcome of `run_census_enrichment`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CensusRunReport {
    /// Passes actually run (initial pass included).
    pub passes: u32,
    /// Distinct records attempted at least once.
    pub processed: usize,
    /// Fetch attempts across all passes.
    pub attempts: usize,
    pub merged: usize,
    pub failed: usize,
    pub incomplete_before: usize,
    pub incomplete_after: usize,
    pub missing_before: BTreeMap<String, usize>,
    pub missing_by_field: BTreeMap<String, usize>,
}

impl fmt::Display for CensusRunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Census Enrichment Complete ===")?;
        writeln!(f, "Passes run:           {}", self.passes)?;
        writeln!(f, "Records processed:    {}", self.processed)?;
        writeln!(f, "Fetch attempts:       {}", self.attempts)?;
        writeln!(f, "Merged:               {}", self.merged)?;
        writeln!(f, "Failed:               {}", self.failed)?;
        writeln!(
            f,
            "Incomplete records:   {} -> {}",
            self.incomplete_before, self.incomplete_after
        )?;

        if !self.missing_by_field.is_empty() || !self.missing_before.is_empty() {
            writeln!(f, "\nMissing by field (before -> after):")?;
            let fields: std::collections::BTreeSet<&String> = self
                .missing_before
                .keys()
                .chain(self.missing_by_field.keys())
                .collect();
            for field in fields {
                let before = self.missing_before.get(field).copied().unwrap_or(0);
                let after = self.missing_by_field.get(field).copied().unwrap_or(0);
                writeln!(f, "  {field:<24} {before:>5} -> {after}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of `run_distance_enrichment`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceRunReport {
    pub candidates: usize,
    pub processed: usize,
    pub enriched: usize,
    pub no_result: usize,
}

impl fmt::Display for DistanceRunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Distance Enrichment Complete ===")?;
        writeln!(f, "Candidates:           {}", self.candidates)?;
        writeln!(f, "Processed:            {}", self.processed)?;
        writeln!(f, "Enriched:             {}", self.enriched)?;
        writeln!(f, "No result:            {}", self.no_result)?;
        Ok(())
    }
}
