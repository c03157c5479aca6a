use et_frame::{FrameError, Table};

/// Which of the wanted columns a table actually has.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnAvailability {
    pub present: Vec<String>,
    pub absent: Vec<String>,
}

impl ColumnAvailability {
    #[must_use]
    pub fn check(table: &Table, wanted: &[String]) -> Self {
        let (present, absent) = wanted
            .iter()
            .cloned()
            .partition(|name| table.has_column(name));
        Self { present, absent }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.absent.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Projection {
    pub table: Table,
    pub availability: ColumnAvailability,
}

/// Restricts a table to the retained columns. Columns configured but absent
/// from a file are dropped for that file only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProjector {
    retained: Vec<String>,
}

impl ColumnProjector {
    #[must_use]
    pub fn new(retained: Vec<String>) -> Self {
        Self { retained }
    }

    #[must_use]
    pub fn retained(&self) -> &[String] {
        &self.retained
    }

    pub fn project(&self, table: &Table) -> Result<Projection, FrameError> {
        let availability = ColumnAvailability::check(table, &self.retained);
        for name in &availability.absent {
            log::warn!("'{name}' not found in dataset, skipping column");
        }
        let table = table.select(&availability.present)?;
        Ok(Projection {
            table,
            availability,
        })
    }
}

#[cfg(test)]
mod tests {
    use et_frame::Table;
    use et_types::Scalar;

    use super::{ColumnAvailability, ColumnProjector};

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn table() -> Table {
        Table::from_values(vec![
            ("TIMESTAMP", vec![Scalar::Int64(1), Scalar::Int64(2)]),
            ("RIGHT_GAZE_X", vec![Scalar::Float64(0.1), Scalar::Float64(0.2)]),
            ("TRIAL_INDEX", vec![Scalar::Int64(1), Scalar::Int64(1)]),
            ("RIGHT_PUPIL_SIZE", vec![Scalar::Float64(3.0), Scalar::Float64(3.5)]),
        ])
        .expect("table")
    }

    #[test]
    fn availability_splits_wanted_columns() {
        let availability = ColumnAvailability::check(
            &table(),
            &names(&["TRIAL_INDEX", "LEFT_GAZE_X", "RIGHT_GAZE_X"]),
        );
        assert_eq!(availability.present, names(&["TRIAL_INDEX", "RIGHT_GAZE_X"]));
        assert_eq!(availability.absent, names(&["LEFT_GAZE_X"]));
        assert!(!availability.is_complete());
    }

    #[test]
    fn projection_keeps_table_order_and_rows() {
        let projector = ColumnProjector::new(names(&[
            "TRIAL_INDEX",
            "RIGHT_PUPIL_SIZE",
            "RIGHT_GAZE_X",
            "LEFT_PUPIL_SIZE",
        ]));
        let projection = projector.project(&table()).expect("project");

        assert_eq!(
            projection.table.column_names(),
            &["RIGHT_GAZE_X", "TRIAL_INDEX", "RIGHT_PUPIL_SIZE"]
        );
        assert_eq!(projection.table.len(), 2);
        assert_eq!(projection.availability.absent, names(&["LEFT_PUPIL_SIZE"]));
    }

    #[test]
    fn nothing_present_yields_empty_projection() {
        let projector = ColumnProjector::new(names(&["NOPE"]));
        let projection = projector.project(&table()).expect("project");
        assert_eq!(projection.table.column_count(), 0);
    }
}
