//! Integration tests for window validation, cleaning and feature construction

use demand_forecast::prelude::*;
use demand_forecast::data::CategoryRecord;
use std::collections::HashMap;

fn scenario_tables() -> SourceTables {
    SourceTables {
        transactions: vec![
            TransactionRecord::new(0, 1, 100, 1500.0, 5.0).with_date_text("02.01.2013"),
            TransactionRecord::new(1, 1, 100, 1550.0, 7.0).with_date_text("03.02.2013"),
            TransactionRecord::new(2, 1, 100, 1500.0, 6.0).with_date_text("04.03.2013"),
        ],
        items: vec![ItemRecord { item_id: 100, category_id: 40, name: None }],
        stores: vec![StoreRecord { store_id: 1, name: None }],
        categories: vec![CategoryRecord { category_id: 40, name: None }],
    }
}

/// Deterministic multi-store history with gaps and outliers
fn synthetic_records() -> Vec<TransactionRecord> {
    let mut records = Vec::new();
    for month in 0..12i64 {
        for store in 1..=4i64 {
            for item in 100..110i64 {
                // Skip some cells so series have holes
                if (month + store + item) % 5 == 0 {
                    continue;
                }
                let quantity = ((month * 7 + store * 3 + item) % 9) as f64;
                let price = 100.0 + ((item * 13 + month) % 17) as f64 * 10.0;
                records.push(TransactionRecord::new(month, store, item, price, quantity));
                if item % 3 == 0 {
                    records.push(TransactionRecord::new(month, store, item, price * 1.1, 30.0));
                }
            }
        }
    }
    records
}

fn synthetic_items() -> Vec<ItemRecord> {
    (100..110).map(|item_id| ItemRecord { item_id, category_id: item_id % 3, name: None }).collect()
}

fn synthetic_stores() -> Vec<StoreRecord> {
    (1..=4).map(|store_id| StoreRecord { store_id, name: None }).collect()
}

fn build_synthetic() -> Vec<FeatureRow> {
    let cleaned = Sanitizer::default().clean(&synthetic_records()).unwrap();
    let segments = StoreSegmenter::new(2).segment(&synthetic_stores(), &cleaned).unwrap();
    FeatureBuilder::new(WindowSpec::default()).build(&cleaned, &synthetic_items(), &segments)
}

// ============================================================================
// Window validation
// ============================================================================

#[test]
fn test_window_validation_scenarios() {
    let err = validate_window_sizes(&[3]).unwrap_err();
    assert!(err.to_string().contains("exactly 2"));

    assert_eq!(validate_window_sizes(&[6, 3]).unwrap().windows(), [3, 6]);

    let err = validate_window_sizes(&[3, 3]).unwrap_err();
    assert!(err.to_string().contains("cannot repeat"));
}

#[test]
fn test_valid_windows_are_ascending_and_in_range() {
    for a in 2..=12u32 {
        for b in 2..=12u32 {
            if a == b {
                assert!(validate_window_sizes(&[a, b]).is_err());
                continue;
            }
            let spec = validate_window_sizes(&[a, b]).unwrap();
            assert!(spec.short() < spec.long());
            assert!(spec.short() >= 2 && spec.long() <= 12);
        }
    }
    assert!(validate_window_sizes(&[1, 5]).is_err());
    assert!(validate_window_sizes(&[3.5, 6.0]).is_err());
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[test]
fn test_scenario_store_1_item_100() {
    let output = run_pipeline(&scenario_tables(), &PipelineConfig::default()).unwrap();
    let rows = output.split.rows();
    assert_eq!(rows.len(), 3);

    let m2 = &rows[2];
    assert_eq!(m2.quantity_lags, [7.0, 5.0, 0.0]);
    assert!((m2.delta_1_2 - 2.0).abs() < 1e-6);
    assert!(m2.price_discount <= 0.0);
    // (5 + 7) / 2 over the months before month 2
    assert!((m2.rolling_for(3).unwrap().mean - 6.0).abs() < 1e-6);

    let pct = (1500.0 - 1550.0) / (1550.0 + 1e-6);
    assert!((m2.price_change_pct - pct).abs() < 1e-9);
    assert!((m2.price_demand_elasticity - 2.0 / (pct + 1e-6)).abs() < 1e-6);
    let rolling = m2.rolling_for(3).unwrap();
    assert!((rolling.volatility_coef - rolling.std / (rolling.mean + 1e-6)).abs() < 1e-9);
    assert!(rolling.volatility_coef > 0.0);
    assert!((m2.target_log - 6f64.ln_1p()).abs() < 1e-9);

    assert_eq!(output.split.train().len(), 1);
    assert_eq!(output.split.val().len(), 1);
    assert_eq!(output.split.test().len(), 1);
}

#[test]
fn test_first_month_rolling_is_zero() {
    let output = run_pipeline(&scenario_tables(), &PipelineConfig::default()).unwrap();
    let first = &output.split.rows()[0];
    for rolling in &first.rolling {
        assert_eq!(rolling.mean, 0.0);
        assert_eq!(rolling.std, 0.0);
    }
}

#[test]
fn test_prediction_row_matches_training_row() {
    let mut tables = scenario_tables();
    tables.transactions.push(TransactionRecord::new(3, 1, 100, 1500.0, 9.0));
    let output = run_pipeline(&tables, &PipelineConfig::default()).unwrap();
    let trained = &output.split.rows()[3];

    let request = PredictionInput::new(0, 40, 1500.0, trained.quantity_lags)
        .with_price_lags(trained.price_lags);
    let served = request.to_feature_row(&output.pricing).unwrap();

    for (a, b) in trained.rolling.iter().zip(served.rolling.iter()) {
        assert!((a.mean - b.mean).abs() < 1e-9);
        assert!((a.std - b.std).abs() < 1e-9);
        assert!((a.zscore - b.zscore).abs() < 1e-9);
    }
    assert_eq!(trained.is_new_price, served.is_new_price);
    assert!((trained.price_change_pct - served.price_change_pct).abs() < 1e-12);
}

#[test]
fn test_cold_start_prediction_matches_training_row() {
    let output = run_pipeline(&scenario_tables(), &PipelineConfig::default()).unwrap();
    let trained = &output.split.rows()[0];

    let served = PredictionInput::new(0, 40, 1500.0, [0.0; 3])
        .to_feature_row(&output.pricing)
        .unwrap();

    assert_eq!(trained.is_new_price, served.is_new_price);
    assert!((trained.price_change_pct - served.price_change_pct).abs() < 1e-3);
    assert_eq!(served.price_demand_elasticity, 0.0);
    assert_eq!(trained.rolling, served.rolling);
}

// ============================================================================
// Properties over a larger history
// ============================================================================

#[test]
fn test_lag_matches_previous_month() {
    let rows = build_synthetic();
    let by_key: HashMap<(i64, i64, i64), f64> = rows
        .iter()
        .map(|r| ((r.month_index, r.store_id, r.item_id), r.quantity))
        .collect();

    for row in &rows {
        for lag in 1..=3i64 {
            let expected = by_key
                .get(&(row.month_index - lag, row.store_id, row.item_id))
                .copied()
                .unwrap_or(0.0);
            assert_eq!(row.quantity_lags[(lag - 1) as usize], expected);
        }
    }
}

#[test]
fn test_rolling_ignores_own_month() {
    let base = build_synthetic();

    // Change every month-6 quantity; month-6 features must not move
    let mut records = synthetic_records();
    for record in records.iter_mut().filter(|r| r.month_index == 6) {
        record.quantity = 19.0 - record.quantity.min(19.0);
    }
    // Same segments as the unchanged history
    let original = Sanitizer::default().clean(&synthetic_records()).unwrap();
    let segments = StoreSegmenter::new(2).segment(&synthetic_stores(), &original).unwrap();
    let cleaned = Sanitizer::default().clean(&records).unwrap();
    let changed = FeatureBuilder::new(WindowSpec::default()).build(&cleaned, &synthetic_items(), &segments);

    let month_6 = |rows: &[FeatureRow]| -> Vec<Vec<f64>> {
        rows.iter().filter(|r| r.month_index == 6).map(|r| r.values()).collect()
    };
    assert_eq!(month_6(&base), month_6(&changed));
}

#[test]
fn test_monthly_quantity_reclipped() {
    let rows = build_synthetic();
    assert!(rows.iter().all(|r| r.quantity >= 0.0 && r.quantity <= 20.0));
    // Items with a 30-unit transaction hit the monthly cap
    assert!(rows.iter().any(|r| r.item_id % 3 == 0 && r.quantity == 20.0));
}

#[test]
fn test_rows_sorted_and_finite() {
    let rows = build_synthetic();
    assert!(rows
        .windows(2)
        .all(|w| (w[0].month_index, w[0].store_id, w[0].item_id) < (w[1].month_index, w[1].store_id, w[1].item_id)));

    let matrix = feature_matrix(&rows).unwrap();
    assert_eq!(matrix.ncols(), feature_names(&WindowSpec::default()).len());
    assert!(matrix.iter().all(|v| v.is_finite()));
}

#[test]
fn test_output_independent_of_thread_count() {
    let parallel = build_synthetic();
    let single = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(build_synthetic);
    assert_eq!(parallel, single);
}

#[test]
fn test_custom_windows_change_feature_names() {
    let config = PipelineConfig::default().with_rolling_windows(vec![12.0, 2.0]);
    let output = run_pipeline(&scenario_tables(), &config).unwrap();

    assert!(output.feature_names.contains(&"rolling_mean_2".to_string()));
    assert!(output.feature_names.contains(&"rolling_std_12".to_string()));
    assert!(!output.feature_names.contains(&"rolling_mean_3".to_string()));
}

#[test]
fn test_clean_idempotent_on_synthetic() {
    let sanitizer = Sanitizer::default();
    let once = sanitizer.clean(&synthetic_records()).unwrap();
    let twice = sanitizer.clean(&once).unwrap();
    assert_eq!(once, twice);
    assert!(once.iter().all(|r| r.unit_price > 0.0 && r.quantity <= 20.0));
}
