use crate::pricing::PricingTable;
use crate::query::CompiledQuery;
use crate::registry::ViewName;
use crate::store::{CellValue, ResultRow};

/// Column added to enriched rows, in USD.
pub const ESTIMATED_COST: &str = "estimatedCost";

const MODEL_DIMENSION: &str = "providedModelName";
const INPUT_TOKENS: &str = "sum_inputTokens";
const OUTPUT_TOKENS: &str = "sum_outputTokens";

/// Whether rows of `query` can carry a per-model cost estimate: an
/// observations query grouped by model that sums both token counts.
pub fn supports_cost_estimate(query: &CompiledQuery) -> bool {
    query.view == ViewName::Observations
        && query.dimensions.iter().any(|d| d == MODEL_DIMENSION)
        && query.columns.iter().any(|c| c == INPUT_TOKENS)
        && query.columns.iter().any(|c| c == OUTPUT_TOKENS)
}

/// Add `estimatedCost` to each row from the model's price. Unknown models
/// get `null`. Returns the number of rows priced.
pub fn apply_cost_estimate(rows: &mut [ResultRow], pricing: &PricingTable) -> usize {
    let mut priced = 0;
    for row in rows.iter_mut() {
        let cost = row
            .get(MODEL_DIMENSION)
            .and_then(CellValue::as_str)
            .and_then(|model| {
                let input = row.get(INPUT_TOKENS).and_then(CellValue::as_i64).unwrap_or(0);
                let output = row.get(OUTPUT_TOKENS).and_then(CellValue::as_i64).unwrap_or(0);
                pricing.cost_usd(model, input, output)
            });
        if cost.is_some() {
            priced += 1;
        }
        row.insert(ESTIMATED_COST.to_string(), CellValue::from(cost));
    }
    priced
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(model: Option<&str>, input: i64, output: i64) -> ResultRow {
        let mut r = ResultRow::new();
        r.insert(
            MODEL_DIMENSION.into(),
            model.map(CellValue::from).unwrap_or(CellValue::Null),
        );
        r.insert(INPUT_TOKENS.into(), CellValue::Int(input));
        r.insert(OUTPUT_TOKENS.into(), CellValue::Int(output));
        r
    }

    #[test]
    fn test_cost_per_row() {
        let pricing = PricingTable::new();
        let mut rows = vec![
            row(Some("gpt-4o-2024-08-06"), 1_000_000, 0),
            row(Some("unknown-model"), 10, 10),
            row(None, 10, 10),
        ];
        assert_eq!(apply_cost_estimate(&mut rows, &pricing), 1);
        let cost = rows[0][ESTIMATED_COST].as_f64().unwrap();
        assert!((cost - 2.5).abs() < 1e-9);
        assert_eq!(rows[1][ESTIMATED_COST], CellValue::Null);
        assert_eq!(rows[2][ESTIMATED_COST], CellValue::Null);
    }
}
