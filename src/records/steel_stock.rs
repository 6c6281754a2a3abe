use serde::{Deserialize, Serialize};

use super::{present, require, Record};
use crate::core::data::Table;

/// Reinforcement steel position for one bar diameter, in tonnes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteelStockRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub serial_no: Option<i32>,
    #[serde(default)]
    pub diameter: String,
    pub total_received: Option<f64>,
    pub stock_at_site: Option<f64>,
    pub consumed: Option<f64>,
}

impl Record for SteelStockRecord {
    const TABLE: Table = Table::SteelStock;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        require(&[
            ("diameter", present(&self.diameter)),
            ("total received", self.total_received.is_some()),
            ("stock at site", self.stock_at_site.is_some()),
        ])?;
        match (self.total_received, self.stock_at_site) {
            (Some(received), Some(stock)) if stock > received => {
                Err("Stock at site cannot exceed the total received".to_string())
            }
            _ => Ok(()),
        }
    }

    fn normalize(&mut self) {
        self.diameter = self.diameter.trim().to_string();
        if self.consumed.is_none() {
            if let (Some(received), Some(stock)) = (self.total_received, self.stock_at_site) {
                self.consumed = Some(received - stock);
            }
        }
    }

    fn serial_no(&self) -> Option<i32> {
        self.serial_no
    }

    fn set_serial_no(&mut self, serial: i32) {
        self.serial_no = Some(serial);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumed_filled_only_when_empty() {
        let mut stock = SteelStockRecord {
            id: None,
            serial_no: None,
            diameter: "12mm".into(),
            total_received: Some(40.0),
            stock_at_site: Some(12.5),
            consumed: None,
        };
        assert!(stock.validate().is_ok());
        stock.normalize();
        assert_eq!(stock.consumed, Some(27.5));

        stock.consumed = Some(20.0);
        stock.normalize();
        assert_eq!(stock.consumed, Some(20.0));
    }

    #[test]
    fn test_stock_above_received_is_rejected() {
        let stock = SteelStockRecord {
            id: None,
            serial_no: None,
            diameter: "16mm".into(),
            total_received: Some(5.0),
            stock_at_site: Some(6.0),
            consumed: None,
        };
        assert!(stock.validate().is_err());
    }
}
