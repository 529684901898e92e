use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use lasso_cv::config::RunConfig;
use lasso_cv::data::Dataset;
use lasso_cv::regression::{self, fit_path, FittedModel, PathOptions};
use lasso_cv::service::{LocalHost, ScoringService, ServiceHost};
use lasso_cv::Selection;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

const COLUMNS: [&str; 14] = [
    "crim", "zn", "indus", "chas", "nox", "rm", "age", "dis", "rad", "tax", "ptratio", "b",
    "lstat", "medv",
];

/// A 506 x 14 table shaped like the Boston housing data, with `medv` driven
/// mostly by `rm`, `lstat` and `ptratio`.
fn housing_table() -> Dataset {
    let mut rng = StdRng::seed_from_u64(506);
    let rows = (0..506)
        .map(|_| {
            let crim = rng.gen_range(0.0..10.0);
            let zn = if rng.gen_bool(0.3) { rng.gen_range(10.0..90.0) } else { 0.0 };
            let indus = rng.gen_range(0.5..27.0);
            let chas = if rng.gen_bool(0.07) { 1.0 } else { 0.0 };
            let nox = 0.4 + indus / 60.0 + rng.gen_range(0.0..0.1);
            let rm: f64 = rng.gen_range(4.5..8.5);
            let age = rng.gen_range(3.0..100.0);
            let dis = 1.0 + (100.0 - age) / 12.0 + rng.gen_range(0.0..1.0);
            let rad = rng.gen_range(1..25) as f64;
            let tax = 180.0 + rad * 20.0 + rng.gen_range(0.0..60.0);
            let ptratio = rng.gen_range(12.5..22.0);
            let b = rng.gen_range(300.0..397.0);
            let lstat = (35.0 - 3.5 * rm + rng.gen_range(0.0..10.0)).max(1.7);
            let medv = 22.0 + 5.0 * (rm - 6.3) - 0.6 * (lstat - 12.0) - 0.9 * (ptratio - 18.0)
                + 2.0 * chas
                - 0.1 * crim
                + rng.gen_range(-3.0..3.0);
            vec![
                crim, zn, indus, chas, nox, rm, age, dis, rad, tax, ptratio, b, lstat, medv,
            ]
        })
        .collect();
    Dataset::new(COLUMNS.iter().map(|c| c.to_string()).collect(), rows).expect("table")
}

fn write_csv(data: &Dataset) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp");
    let mut writer = csv::Writer::from_path(file.path()).expect("writer");
    writer.write_record(data.columns()).expect("header");
    for row in data.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .expect("row");
    }
    writer.flush().expect("flush");
    file
}

#[test]
fn cross_validated_fit_on_housing_table() {
    let data = housing_table();
    let file = write_csv(&data);
    let config = RunConfig::for_dataset(PathBuf::from(file.path()), "medv").with_defaults();
    config.validate().expect("config");

    let outcome = regression::fit_cross_validated(&config).expect("fit");
    let cv = &outcome.cv;

    assert_eq!(cv.folds(), 10);
    assert!(cv.lambda_min() > 0.0);
    assert!(cv.lambda_1se() >= cv.lambda_min());
    assert_eq!(outcome.report.lambda_min(), cv.lambda_min());

    // Only the intercept survives at the largest lambda on the path.
    assert_eq!(cv.path().nonzero()[0], 0);
    assert_eq!(cv.path().column(0).nonzero(), 0);

    let first_ten = data.head(10);
    let predictions = outcome.model.predict(&first_ten).expect("predict");
    assert_eq!(predictions.len(), 10);
    assert!(predictions.iter().all(|p| p.is_finite()));

    // Same model, same rows, same answer.
    assert_eq!(outcome.model.predict(&first_ten).expect("again"), predictions);

    let rendered = outcome.report.render();
    assert!(rendered.contains(&format!("lambda.min = {:.4}", cv.lambda_min())));
    assert!(rendered.contains(&format!("lambda.1se = {:.4}", cv.lambda_1se())));
}

#[test]
fn full_path_agrees_with_cross_validation() {
    let data = housing_table();
    let training = data.split_response("medv").expect("split");
    let options = regression::CvOptions::default();

    let cv = regression::cross_validate(&training.x, &training.y, &training.feature_names, &options)
        .expect("cv");
    let path = fit_path(
        &training.x,
        &training.y,
        &training.feature_names,
        &PathOptions::default(),
    )
    .expect("path");

    assert_eq!(path.lambdas(), cv.lambdas());
    assert_eq!(path.coefficient_matrix().nrows(), 14);

    let from_path = path.coefficients_at(cv.lambda_min()).expect("coefficients");
    let from_cv = cv.coefficients(Selection::Min);
    assert_abs_diff_eq!(from_path.intercept, from_cv.intercept, epsilon = 1e-8);
    for (a, b) in from_path.weights.iter().zip(&from_cv.weights) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-8);
    }

    assert_eq!(path.nonzero()[0], 0);
    assert_eq!(path.coefficients_at(f64::INFINITY).expect("inf").nonzero(), 0);
}

#[test]
fn saved_model_serves_requests() {
    let data = housing_table();
    let training = data.split_response("medv").expect("split");
    let cv = regression::cross_validate(
        &training.x,
        &training.y,
        &training.feature_names,
        &regression::CvOptions::default(),
    )
    .expect("cv");
    let model = FittedModel::new("medv", &training.feature_names, cv.coefficients(Selection::OneSe));

    let file = NamedTempFile::new().expect("temp");
    model.save(file.path()).expect("save");
    let restored = FittedModel::load(file.path()).expect("load");
    assert_eq!(restored, model);

    let mut host = LocalHost::new();
    host.publish("boston", ScoringService::new(restored))
        .expect("publish");

    let row: serde_json::Map<String, serde_json::Value> = COLUMNS
        .iter()
        .zip(&data.rows()[0])
        .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
        .collect();
    let with_response = serde_json::json!({ "rows": [row.clone()] }).to_string();
    let mut without = row;
    without.remove("medv");
    let without_response = serde_json::json!({ "rows": [without] }).to_string();

    let a = host.invoke("boston", &with_response).expect("with");
    let b = host.invoke("boston", &without_response).expect("without");
    assert_eq!(a, b);

    let expected = model.predict(&data.head(1)).expect("predict")[0];
    let reply: serde_json::Value = serde_json::from_str(&a).expect("json");
    assert_abs_diff_eq!(reply["prediction"][0].as_f64().expect("number"), expected, epsilon = 1e-12);
}
