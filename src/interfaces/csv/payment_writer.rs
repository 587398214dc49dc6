use crate::domain::payment::PaymentRecord;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct PaymentRow<'a> {
    order_id: &'a str,
    product_id: &'a str,
    product_name: &'a str,
    price: String,
    payment_method: &'static str,
    status: &'static str,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    phone: &'a str,
    card_last4: &'a str,
    processed_at: String,
}

impl<'a> From<&'a PaymentRecord> for PaymentRow<'a> {
    fn from(record: &'a PaymentRecord) -> Self {
        Self {
            order_id: &record.order_id,
            product_id: &record.product_id,
            product_name: &record.product_name,
            price: record.price.to_string(),
            payment_method: record.payment_method.as_str(),
            status: record.status.as_str(),
            first_name: &record.customer.first_name,
            last_name: &record.customer.last_name,
            email: &record.customer.email,
            phone: &record.customer.phone,
            card_last4: record.card_last4.as_deref().unwrap_or_default(),
            processed_at: record.processed_at.to_rfc3339(),
        }
    }
}

/// Writes payment records as CSV, one flat row per record.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the header followed by every record, even when there are none.
    pub fn write_records(&mut self, records: &[PaymentRecord]) -> Result<()> {
        if records.is_empty() {
            self.writer.write_record([
                "order_id",
                "product_id",
                "product_name",
                "price",
                "payment_method",
                "status",
                "first_name",
                "last_name",
                "email",
                "phone",
                "card_last4",
                "processed_at",
            ])?;
        }
        for record in records {
            self.writer.serialize(PaymentRow::from(record))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
