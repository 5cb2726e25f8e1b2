use crate::application::report::UserReport;
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::Write;

const OVERVIEW_HEADER: [&str; 10] = [
    "TransactionID",
    "RequestID",
    "FromAccountID",
    "ToAccountID",
    "Amount(Cents)",
    "Status",
    "ErrorMessage",
    "FromAccountBalance",
    "ToAccountBalance",
    "CreatedAt",
];

const AUDIT_HEADER: [&str; 5] = ["RequestID", "Action", "Status", "Message", "Timestamp"];

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Renders a [`UserReport`] as a sectioned CSV document.
///
/// Sections are separated by a blank line and introduced by a title row, so
/// rows have differing widths and the writer runs in flexible mode.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(sink);
        Self { writer }
    }

    pub fn write_report(&mut self, report: &UserReport) -> Result<()> {
        self.writer.write_record(["=== TRANSACTION OVERVIEW ==="])?;
        self.writer.write_record(OVERVIEW_HEADER)?;
        for detail in &report.details {
            let tx = &detail.transaction;
            self.writer.write_record([
                tx.id.to_string(),
                tx.request_id.clone(),
                tx.from_account_id.to_string(),
                tx.to_account_id.to_string(),
                tx.amount.to_string(),
                tx.status.to_string(),
                tx.error_message.clone().unwrap_or_default(),
                tx.from_balance.to_string(),
                tx.to_balance.to_string(),
                timestamp(&tx.created_at),
            ])?;
        }

        self.writer.write_record([""])?;
        self.writer.write_record(["=== AUDIT TRAIL ==="])?;
        self.writer.write_record(AUDIT_HEADER)?;
        for entry in report.details.iter().flat_map(|d| &d.audit_logs) {
            self.writer.write_record([
                entry.request_id.clone(),
                entry.action.to_string(),
                entry.status.to_string(),
                entry.message.clone().unwrap_or_default(),
                timestamp(&entry.timestamp),
            ])?;
        }

        let summary = &report.summary;
        self.writer.write_record([""])?;
        self.writer.write_record(["=== SUMMARY ==="])?;
        self.writer.write_record(["Metric", "Value"])?;
        let metrics = [
            ("Account", report.account.to_string()),
            ("Transactions", summary.transactions.to_string()),
            ("Succeeded", summary.succeeded.to_string()),
            ("Failed", summary.failed.to_string()),
            ("Pending", summary.pending.to_string()),
            ("TotalSent(Cents)", summary.total_sent.to_string()),
            ("TotalReceived(Cents)", summary.total_received.to_string()),
            ("NetFlow(Cents)", summary.net_flow().to_string()),
        ];
        for (name, value) in metrics {
            self.writer.write_record([name, value.as_str()])?;
        }

        self.writer.flush()?;
        Ok(())
    }
}
