use tabled::{Table, builder::Builder, settings};
use types::Value;

/// Predefined output styles that map to `tabled` styles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TableStyleKind {
    #[default]
    Modern,
    Ascii,
    Plain,
}

impl TableStyleKind {
    fn apply(self, table: &mut Table) {
        match self {
            Self::Modern => table.with(settings::Style::modern()),
            Self::Ascii => table.with(settings::Style::ascii()),
            Self::Plain => table.with(settings::Style::empty()),
        };
    }
}

/// Render decoded rows under their column labels as a human-friendly table.
pub fn render_rows(columns: &[String], rows: &[Vec<Value>], style: TableStyleKind) -> String {
    if columns.is_empty() && rows.is_empty() {
        return "<empty>".into();
    }

    let mut builder = Builder::default();
    builder.push_record(columns.iter().cloned());

    for row in rows {
        builder.push_record(row.iter().map(Value::to_string));
    }

    let mut table = builder.build();
    style.apply(&mut table);
    table.to_string()
}
