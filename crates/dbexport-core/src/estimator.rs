use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ExportConfig;
use crate::encoder::RowEncoder;
use crate::error::Result;
use crate::row::QueryExecutor;
use crate::task::{ExportFormat, ExportScope};

/// How an estimate was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateMethod {
    Metadata,
    Sample,
    Actual,
}

/// Qualitative reliability of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeEstimate {
    pub estimated_bytes: u64,
    pub estimated_mb: f64,
    pub bytes_per_row: u64,
    pub method: EstimateMethod,
    pub confidence: Confidence,
    pub sample_size: Option<usize>,
}

impl SizeEstimate {
    fn new(
        estimated_bytes: u64,
        bytes_per_row: u64,
        method: EstimateMethod,
        confidence: Confidence,
        sample_size: Option<usize>,
    ) -> Self {
        let estimated_mb =
            (estimated_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;
        Self {
            estimated_bytes,
            estimated_mb,
            bytes_per_row,
            method,
            confidence,
            sample_size,
        }
    }
}

/// Advisory verdict for a proposed export. The caller decides whether to
/// proceed; nothing here blocks a submission by itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportCheck {
    pub allowed: bool,
    pub estimated_size: SizeEstimate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Average encoded row width assumed when only a row count is known.
fn metadata_bytes_per_row(format: ExportFormat) -> u64 {
    match format {
        ExportFormat::Csv => 100,
        ExportFormat::Json => 150,
        ExportFormat::Markdown => 120,
    }
}

/// Pre-flight byte-size estimator for a query, format, and scope.
pub struct SizeEstimator {
    executor: Arc<dyn QueryExecutor>,
    config: Arc<ExportConfig>,
}

impl SizeEstimator {
    pub fn new(executor: Arc<dyn QueryExecutor>, config: Arc<ExportConfig>) -> Self {
        Self { executor, config }
    }

    /// Estimate the encoded size, cheapest usable method first.
    pub async fn estimate(
        &self,
        database: &str,
        sql: &str,
        format: ExportFormat,
        scope: ExportScope,
        use_sampling: bool,
        sample_size: Option<usize>,
    ) -> Result<SizeEstimate> {
        if scope == ExportScope::CurrentPage {
            // Already row-bounded: encode the exact set.
            return self.estimate_actual(database, sql, format).await;
        }

        if !use_sampling {
            if let Some(row_count) = self.executor.count_rows(database, sql).await? {
                if row_count > 0 {
                    let bytes_per_row = metadata_bytes_per_row(format);
                    return Ok(SizeEstimate::new(
                        row_count * bytes_per_row,
                        bytes_per_row,
                        EstimateMethod::Metadata,
                        Confidence::Medium,
                        None,
                    ));
                }
            }
            // No usable statistics; fall through to sampling.
        }

        self.estimate_by_sampling(
            database,
            sql,
            format,
            sample_size.unwrap_or(self.config.sample_size),
        )
        .await
    }

    /// Advisory allow/deny plus human-readable guidance.
    pub async fn check(
        &self,
        database: &str,
        sql: &str,
        format: ExportFormat,
        scope: ExportScope,
        use_sampling: bool,
        sample_size: Option<usize>,
    ) -> Result<ExportCheck> {
        let estimate = self
            .estimate(database, sql, format, scope, use_sampling, sample_size)
            .await?;

        let max_bytes = self.config.max_file_size_bytes;
        let max_mb = max_bytes as f64 / (1024.0 * 1024.0);
        let over_limit = estimate.estimated_bytes > max_bytes;
        let low_confidence_risk = estimate.confidence == Confidence::Low
            && estimate.estimated_bytes > self.config.caution_threshold_bytes;

        let mut warning = None;
        let mut recommendation = None;

        if over_limit {
            warning = Some(format!(
                "Estimated file size ({:.2} MB) exceeds maximum allowed ({:.2} MB)",
                estimate.estimated_mb, max_mb
            ));
            recommendation = Some(
                "Consider adding a WHERE clause to filter results or selecting \
                 specific columns"
                    .to_string(),
            );
        } else if low_confidence_risk {
            warning = Some(format!(
                "Estimated file size ({:.2} MB) is uncertain and may exceed the \
                 limit; re-check with sampling enabled",
                estimate.estimated_mb
            ));
            recommendation =
                Some("Re-run the check with useSampling for a firmer estimate".to_string());
        } else if estimate.estimated_bytes as f64 > max_bytes as f64 * 0.8 {
            warning = Some(format!(
                "Estimated file size ({:.2} MB) is close to the maximum limit",
                estimate.estimated_mb
            ));
        }

        Ok(ExportCheck {
            allowed: !over_limit && !low_confidence_risk,
            estimated_size: estimate,
            warning,
            recommendation,
        })
    }

    /// Encode an already-bounded result set in full.
    async fn estimate_actual(
        &self,
        database: &str,
        sql: &str,
        format: ExportFormat,
    ) -> Result<SizeEstimate> {
        let mut source = self
            .executor
            .open(database, sql, ExportScope::CurrentPage)
            .await?;
        let columns = source.columns().to_vec();

        let mut encoder = RowEncoder::new(format);
        let mut bytes = encoder.header(&columns).len() as u64;
        let mut rows: u64 = 0;
        while let Some(batch) = source.next_batch().await? {
            for row in &batch {
                bytes += encoder.row(&columns, row)?.len() as u64;
                rows += 1;
            }
        }
        bytes += encoder.finish().len() as u64;

        let bytes_per_row = if rows > 0 { bytes / rows } else { 0 };
        Ok(SizeEstimate::new(
            bytes,
            bytes_per_row,
            EstimateMethod::Actual,
            Confidence::High,
            None,
        ))
    }

    /// Measure real bytes-per-row on a bounded sample, then extrapolate.
    /// With an unknown total row count the configured multiplier stands in
    /// for the total, and confidence drops to low.
    async fn estimate_by_sampling(
        &self,
        database: &str,
        sql: &str,
        format: ExportFormat,
        sample_size: usize,
    ) -> Result<SizeEstimate> {
        let (columns, rows) = self.executor.sample(database, sql, sample_size).await?;
        let overhead = RowEncoder::empty_overhead(format, &columns);

        if rows.is_empty() {
            // The format's fixed overhead is the exact answer.
            return Ok(SizeEstimate::new(
                overhead,
                0,
                EstimateMethod::Sample,
                Confidence::High,
                Some(0),
            ));
        }

        let mut encoder = RowEncoder::new(format);
        encoder.header(&columns);
        let mut sample_bytes: u64 = 0;
        for row in &rows {
            sample_bytes += encoder.row(&columns, row)?.len() as u64;
        }
        let bytes_per_row = sample_bytes / rows.len() as u64;

        match self.executor.count_rows(database, sql).await? {
            Some(total_rows) => Ok(SizeEstimate::new(
                overhead + total_rows * bytes_per_row,
                bytes_per_row,
                EstimateMethod::Sample,
                Confidence::Medium,
                Some(rows.len()),
            )),
            None => {
                // Row count unknown: assume the sample is a small fraction.
                let assumed_rows = rows.len() as u64 * self.config.unknown_rows_multiplier;
                Ok(SizeEstimate::new(
                    overhead + assumed_rows * bytes_per_row,
                    bytes_per_row,
                    EstimateMethod::Sample,
                    Confidence::Low,
                    Some(rows.len()),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::row::{Column, Row, RowSource, Value};
    use async_trait::async_trait;

    struct VecSource {
        columns: Vec<Column>,
        batches: Vec<Vec<Row>>,
    }

    #[async_trait]
    impl RowSource for VecSource {
        fn columns(&self) -> &[Column] {
            &self.columns
        }

        async fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
            if self.batches.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.batches.remove(0)))
            }
        }
    }

    struct FakeExecutor {
        rows: Vec<Row>,
        known_count: Option<u64>,
    }

    impl FakeExecutor {
        fn columns() -> Vec<Column> {
            vec![Column::new("id", "integer"), Column::new("name", "text")]
        }
    }

    #[async_trait]
    impl QueryExecutor for FakeExecutor {
        async fn open(
            &self,
            _database: &str,
            _sql: &str,
            _scope: ExportScope,
        ) -> Result<Box<dyn RowSource>> {
            Ok(Box::new(VecSource {
                columns: Self::columns(),
                batches: if self.rows.is_empty() {
                    vec![]
                } else {
                    vec![self.rows.clone()]
                },
            }))
        }

        async fn count_rows(&self, _database: &str, _sql: &str) -> Result<Option<u64>> {
            Ok(self.known_count)
        }

        async fn sample(
            &self,
            _database: &str,
            _sql: &str,
            limit: usize,
        ) -> Result<(Vec<Column>, Vec<Row>)> {
            let rows = self.rows.iter().take(limit).cloned().collect();
            Ok((Self::columns(), rows))
        }
    }

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                vec![
                    Value::Int(i as i64),
                    Value::Text(format!("name-{}", i)),
                ]
            })
            .collect()
    }

    fn estimator(rows: Vec<Row>, known_count: Option<u64>) -> SizeEstimator {
        SizeEstimator::new(
            Arc::new(FakeExecutor { rows, known_count }),
            Arc::new(ExportConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_metadata_estimate_uses_row_count() {
        let est = estimator(rows(5), Some(2000));
        let estimate = est
            .estimate("db", "SELECT 1", ExportFormat::Csv, ExportScope::AllData, false, None)
            .await
            .unwrap();

        assert_eq!(estimate.method, EstimateMethod::Metadata);
        assert_eq!(estimate.confidence, Confidence::Medium);
        assert_eq!(estimate.estimated_bytes, 2000 * 100);
    }

    #[tokio::test]
    async fn test_sample_estimate_with_known_total() {
        let est = estimator(rows(10), Some(100));
        let estimate = est
            .estimate("db", "SELECT 1", ExportFormat::Csv, ExportScope::AllData, true, Some(10))
            .await
            .unwrap();

        assert_eq!(estimate.method, EstimateMethod::Sample);
        assert_eq!(estimate.confidence, Confidence::Medium);
        assert_eq!(estimate.sample_size, Some(10));
        assert!(estimate.bytes_per_row > 0);
    }

    #[tokio::test]
    async fn test_sample_estimate_unknown_total_is_low_confidence() {
        let est = estimator(rows(10), None);
        let estimate = est
            .estimate("db", "SELECT 1", ExportFormat::Csv, ExportScope::AllData, true, Some(10))
            .await
            .unwrap();

        assert_eq!(estimate.confidence, Confidence::Low);
        // 10 sampled rows extrapolated by the configured multiplier.
        let expected_rows = 10 * ExportConfig::default().unknown_rows_multiplier;
        assert_eq!(
            estimate.estimated_bytes,
            RowEncoder::empty_overhead(ExportFormat::Csv, &FakeExecutor::columns())
                + expected_rows * estimate.bytes_per_row
        );
    }

    #[tokio::test]
    async fn test_empty_result_is_exact_overhead_with_high_confidence() {
        let est = estimator(vec![], None);
        for format in [ExportFormat::Csv, ExportFormat::Json, ExportFormat::Markdown] {
            let estimate = est
                .estimate("db", "SELECT 1", format, ExportScope::AllData, true, None)
                .await
                .unwrap();

            assert_eq!(estimate.confidence, Confidence::High);
            assert_eq!(
                estimate.estimated_bytes,
                RowEncoder::empty_overhead(format, &FakeExecutor::columns())
            );
        }
    }

    #[tokio::test]
    async fn test_current_page_is_encoded_exactly() {
        let est = estimator(rows(3), None);
        let estimate = est
            .estimate("db", "SELECT 1", ExportFormat::Json, ExportScope::CurrentPage, false, None)
            .await
            .unwrap();

        assert_eq!(estimate.method, EstimateMethod::Actual);
        assert_eq!(estimate.confidence, Confidence::High);
        assert!(estimate.estimated_bytes > 0);
    }

    #[tokio::test]
    async fn test_check_denies_over_limit() {
        // 10 million rows at 150 bytes/row blows past 100 MB.
        let est = estimator(rows(5), Some(10_000_000));
        let check = est
            .check("db", "SELECT 1", ExportFormat::Json, ExportScope::AllData, false, None)
            .await
            .unwrap();

        assert!(!check.allowed);
        assert!(check.warning.unwrap().contains("exceeds maximum"));
        assert!(check.recommendation.is_some());
    }

    #[tokio::test]
    async fn test_check_denies_risky_low_confidence_estimate() {
        // Unknown total with wide rows: low confidence, above the caution
        // threshold but below the hard cap.
        let wide = vec![vec![
            Value::Int(1),
            Value::Text("x".repeat(60_000)),
        ]];
        let est = estimator(wide, None);
        let check = est
            .check("db", "SELECT 1", ExportFormat::Csv, ExportScope::AllData, true, Some(1))
            .await
            .unwrap();

        assert_eq!(check.estimated_size.confidence, Confidence::Low);
        assert!(
            check.estimated_size.estimated_bytes
                <= ExportConfig::default().max_file_size_bytes
        );
        assert!(!check.allowed);
    }

    #[tokio::test]
    async fn test_check_allows_small_export() {
        let est = estimator(rows(3), Some(3));
        let check = est
            .check("db", "SELECT 1", ExportFormat::Csv, ExportScope::AllData, true, None)
            .await
            .unwrap();

        assert!(check.allowed);
        assert!(check.warning.is_none());
    }

    #[tokio::test]
    async fn test_estimate_surfaces_data_source_errors() {
        struct FailingExecutor;

        #[async_trait]
        impl QueryExecutor for FailingExecutor {
            async fn open(
                &self,
                _database: &str,
                _sql: &str,
                _scope: ExportScope,
            ) -> Result<Box<dyn RowSource>> {
                Err(Error::DataSource("connection refused".to_string()))
            }

            async fn count_rows(&self, _database: &str, _sql: &str) -> Result<Option<u64>> {
                Err(Error::DataSource("connection refused".to_string()))
            }

            async fn sample(
                &self,
                _database: &str,
                _sql: &str,
                _limit: usize,
            ) -> Result<(Vec<Column>, Vec<Row>)> {
                Err(Error::DataSource("connection refused".to_string()))
            }
        }

        let est = SizeEstimator::new(
            Arc::new(FailingExecutor),
            Arc::new(ExportConfig::default()),
        );
        let result = est
            .estimate("db", "SELECT 1", ExportFormat::Csv, ExportScope::AllData, false, None)
            .await;
        assert!(matches!(result, Err(Error::DataSource(_))));
    }
}
