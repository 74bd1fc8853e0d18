use super::EllipseCandidate;
use crate::error::CavityError;
use blowout_common::{Column, ResultsTable};

type Getter = fn(&EllipseCandidate) -> f64;

/// Column names and their candidate fields, in column order.
pub const FIELDS: [(&str, Getter); 6] = [
    ("xc", |c| c.xc),
    ("yc", |c| c.yc),
    ("a", |c| c.a),
    ("b", |c| c.b),
    ("orientation", |c| c.orientation),
    ("score", |c| c.score),
];

/// One row per slice. Columns are dense when every slice holds exactly one
/// candidate, ragged otherwise.
pub fn flatten<'a, I>(per_slice: I) -> ResultsTable
where
    I: IntoIterator<Item = &'a [EllipseCandidate]>,
{
    let rows: Vec<&[EllipseCandidate]> = per_slice.into_iter().collect();
    let dense = rows.iter().all(|r| r.len() == 1);

    let columns = FIELDS
        .iter()
        .map(|&(name, get)| {
            let column = if dense {
                Column::Dense(rows.iter().map(|r| get(&r[0])).collect())
            } else {
                Column::Ragged(rows.iter().map(|r| r.iter().map(get).collect()).collect())
            };
            (name.to_string(), column)
        })
        .collect();

    ResultsTable { num_rows: rows.len(), columns }
}

/// Inverse of [`flatten`].
pub fn unflatten(table: &ResultsTable) -> Result<Vec<Vec<EllipseCandidate>>, CavityError> {
    let mut columns = Vec::with_capacity(FIELDS.len());
    for (name, _) in FIELDS {
        let column = table
            .column(name)
            .ok_or_else(|| CavityError::Inconsistent(format!("results table lacks column '{name}'")))?;
        if column.len() != table.num_rows {
            return Err(CavityError::Inconsistent(format!(
                "column '{name}' has {} rows, table has {}",
                column.len(),
                table.num_rows
            )));
        }
        columns.push(column);
    }

    (0..table.num_rows)
        .map(|row| {
            let values: Vec<Vec<f64>> =
                columns.iter().map(|c| c.row(row).unwrap_or_default()).collect();
            let count = values[0].len();
            if values.iter().any(|v| v.len() != count) {
                return Err(CavityError::Inconsistent(format!("row {row} has uneven candidate fields")));
            }
            Ok((0..count)
                .map(|k| EllipseCandidate {
                    xc: values[0][k],
                    yc: values[1][k],
                    a: values[2][k],
                    b: values[3][k],
                    orientation: values[4][k],
                    score: values[5][k],
                })
                .collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(a: f64, score: f64) -> EllipseCandidate {
        EllipseCandidate { xc: 10.0, yc: 12.0, a, b: a / 2.0, orientation: 0.1, score }
    }

    #[test]
    fn single_candidates_give_dense_columns() {
        let slices = vec![vec![candidate(20.0, 9.0)], vec![candidate(22.0, 7.0)]];
        let table = flatten(slices.iter().map(Vec::as_slice));
        assert_eq!(table.num_rows, 2);
        assert_eq!(table.column("a"), Some(&Column::Dense(vec![20.0, 22.0])));
        assert_eq!(table.column("score"), Some(&Column::Dense(vec![9.0, 7.0])));
        assert_eq!(unflatten(&table).unwrap(), slices);
    }

    #[test]
    fn varying_counts_give_ragged_columns() {
        let slices = vec![vec![], vec![candidate(20.0, 9.0), candidate(18.0, 6.0)], vec![candidate(5.0, 5.0)]];
        let table = flatten(slices.iter().map(Vec::as_slice));
        assert_eq!(
            table.column("a"),
            Some(&Column::Ragged(vec![vec![], vec![20.0, 18.0], vec![5.0]]))
        );
        assert_eq!(unflatten(&table).unwrap(), slices);
    }

    #[test]
    fn every_field_has_its_own_column() {
        let c = EllipseCandidate { xc: 1.0, yc: 2.0, a: 3.0, b: 4.0, orientation: 5.0, score: 6.0 };
        let table = flatten([std::slice::from_ref(&c)]);
        assert_eq!(table.columns.len(), FIELDS.len());
        for (k, (name, _)) in FIELDS.iter().enumerate() {
            assert_eq!(table.column(name), Some(&Column::Dense(vec![k as f64 + 1.0])));
        }
    }

    #[test]
    fn broken_tables_are_rejected() {
        let slices = vec![vec![candidate(20.0, 9.0)]];
        let mut table = flatten(slices.iter().map(Vec::as_slice));
        table.columns.remove("yc");
        assert!(unflatten(&table).is_err());

        let mut table = flatten(slices.iter().map(Vec::as_slice));
        table.columns.insert("b".into(), Column::Ragged(vec![vec![1.0, 2.0]]));
        assert!(unflatten(&table).is_err());
    }
}
