use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Hindrances,
    OtherInputs,
    Drawings,
    Approvals,
    ConcretePlan,
    ConcreteActual,
    ManpowerPlan,
    ManpowerActual,
    CashflowPlan,
    CashflowActual,
    TowerFinishDates,
    SteelStock,
    NonNegotiables,
    CriticalIssues,
    AppUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Date,
    Bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        ty,
        nullable: false,
    }
}

const fn opt(name: &'static str, ty: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        ty,
        nullable: true,
    }
}

/// Static description of one backend table: its columns (without the
/// surrogate `id`), the conflict target used by upserts, the ordering used by
/// the loader, and whether a submit checks the natural key before inserting.
#[derive(Debug)]
pub struct TableSpec {
    pub table: Table,
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    pub natural_key: &'static [&'static str],
    pub order_by: &'static [&'static str],
    pub detect_duplicates: bool,
    pub realtime: bool,
}

use ColumnType::{Bool, Date, Float, Int, Text};

const WEEKLY_KEY: &[&str] = &["year", "month", "week", "tower"];
const WEEKLY_ORDER: &[&str] = &["year", "month", "week", "tower"];
const MONTHLY_KEY: &[&str] = &["year", "month"];

static SPECS: &[TableSpec] = &[
    TableSpec {
        table: Table::Hindrances,
        name: "hindrances",
        columns: &[
            col("tower", Text),
            col("serial_no", Int),
            col("item_description", Text),
            col("start_date", Date),
            opt("resolved_date", Date),
            opt("period_days", Int),
            opt("reason", Text),
            opt("remarks", Text),
        ],
        natural_key: &[],
        order_by: &["serial_no"],
        detect_duplicates: false,
        realtime: false,
    },
    TableSpec {
        table: Table::OtherInputs,
        name: "other_inputs",
        columns: &[col("serial_no", Int), col("content", Text)],
        natural_key: &[],
        order_by: &["serial_no"],
        detect_duplicates: false,
        realtime: false,
    },
    TableSpec {
        table: Table::Drawings,
        name: "drawings",
        columns: &[
            col("serial_no", Int),
            col("category", Text),
            col("description", Text),
            opt("record_date", Date),
        ],
        natural_key: &[],
        order_by: &["serial_no"],
        detect_duplicates: false,
        realtime: false,
    },
    TableSpec {
        table: Table::Approvals,
        name: "approvals",
        columns: &[
            col("serial_no", Int),
            col("category", Text),
            col("description", Text),
            opt("record_date", Date),
            col("status", Text),
        ],
        natural_key: &[],
        order_by: &["serial_no"],
        detect_duplicates: false,
        realtime: false,
    },
    TableSpec {
        table: Table::ConcretePlan,
        name: "concrete_plan",
        columns: &[
            col("year", Int),
            col("month", Int),
            col("week", Int),
            col("tower", Text),
            col("planned_volume", Float),
        ],
        natural_key: WEEKLY_KEY,
        order_by: WEEKLY_ORDER,
        detect_duplicates: true,
        realtime: true,
    },
    TableSpec {
        table: Table::ConcreteActual,
        name: "concrete_actual",
        columns: &[
            col("year", Int),
            col("month", Int),
            col("week", Int),
            col("tower", Text),
            col("actual_volume", Float),
        ],
        natural_key: WEEKLY_KEY,
        order_by: WEEKLY_ORDER,
        detect_duplicates: true,
        realtime: true,
    },
    TableSpec {
        table: Table::ManpowerPlan,
        name: "manpower_plan",
        columns: &[
            col("year", Int),
            col("month", Int),
            col("week", Int),
            col("tower", Text),
            col("planned_count", Int),
        ],
        natural_key: WEEKLY_KEY,
        order_by: WEEKLY_ORDER,
        detect_duplicates: true,
        realtime: true,
    },
    TableSpec {
        table: Table::ManpowerActual,
        name: "manpower_actual",
        columns: &[
            col("year", Int),
            col("month", Int),
            col("week", Int),
            col("tower", Text),
            col("actual_count", Int),
        ],
        natural_key: WEEKLY_KEY,
        order_by: WEEKLY_ORDER,
        detect_duplicates: true,
        realtime: true,
    },
    TableSpec {
        table: Table::CashflowPlan,
        name: "cashflow_plan",
        columns: &[
            col("year", Int),
            col("month", Int),
            col("planned_amount", Float),
        ],
        natural_key: MONTHLY_KEY,
        order_by: MONTHLY_KEY,
        detect_duplicates: true,
        realtime: true,
    },
    TableSpec {
        table: Table::CashflowActual,
        name: "cashflow_actual",
        columns: &[
            col("year", Int),
            col("month", Int),
            col("actual_amount", Float),
        ],
        natural_key: MONTHLY_KEY,
        order_by: MONTHLY_KEY,
        detect_duplicates: true,
        realtime: true,
    },
    TableSpec {
        table: Table::TowerFinishDates,
        name: "tower_finish_dates",
        columns: &[
            col("tower", Text),
            col("planned_finish", Date),
            opt("projected_finish", Date),
            opt("variance_days", Int),
        ],
        natural_key: &["tower"],
        order_by: &["tower"],
        detect_duplicates: false,
        realtime: false,
    },
    TableSpec {
        table: Table::SteelStock,
        name: "steel_stock",
        columns: &[
            col("serial_no", Int),
            col("diameter", Text),
            col("total_received", Float),
            col("stock_at_site", Float),
            col("consumed", Float),
        ],
        natural_key: &[],
        order_by: &["serial_no"],
        detect_duplicates: false,
        realtime: false,
    },
    TableSpec {
        table: Table::NonNegotiables,
        name: "non_negotiables",
        columns: &[
            col("tower", Text),
            col("task", Text),
            col("completed", Bool),
        ],
        natural_key: &[],
        order_by: &["tower", "id"],
        detect_duplicates: false,
        realtime: false,
    },
    TableSpec {
        table: Table::CriticalIssues,
        name: "critical_issues",
        columns: &[col("description", Text), opt("category", Text)],
        natural_key: &[],
        order_by: &["id"],
        detect_duplicates: false,
        realtime: false,
    },
    TableSpec {
        table: Table::AppUsers,
        name: "app_users",
        columns: &[
            col("email", Text),
            col("password_hash", Text),
            opt("display_name", Text),
        ],
        natural_key: &["email"],
        order_by: &["email"],
        detect_duplicates: false,
        realtime: false,
    },
];

impl Table {
    pub const ALL: [Table; 15] = [
        Table::Hindrances,
        Table::OtherInputs,
        Table::Drawings,
        Table::Approvals,
        Table::ConcretePlan,
        Table::ConcreteActual,
        Table::ManpowerPlan,
        Table::ManpowerActual,
        Table::CashflowPlan,
        Table::CashflowActual,
        Table::TowerFinishDates,
        Table::SteelStock,
        Table::NonNegotiables,
        Table::CriticalIssues,
        Table::AppUsers,
    ];

    pub fn spec(self) -> &'static TableSpec {
        // SPECS is declared in the same order as `Table`.
        &SPECS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn has_column(self, column: &str) -> bool {
        column == "id" || self.spec().columns.iter().any(|c| c.name == column)
    }

    pub fn column(self, column: &str) -> Option<&'static ColumnSpec> {
        self.spec().columns.iter().find(|c| c.name == column)
    }

    /// Tables reachable through the public record API.
    pub fn is_public(self) -> bool {
        self != Table::AppUsers
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        Table::ALL
            .iter()
            .copied()
            .find(|t| t.name() == normalized)
            .ok_or_else(|| format!("Unknown table: {s}"))
    }
}
