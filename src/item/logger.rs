use log::info;

use crate::{
    core::{item::ItemWriter, row::RowMetaAndData},
    BatchError,
};

/// Logs every row it receives as `field=value` pairs.
///
/// Handy as the output of an injection step while a template is being
/// tuned.
#[derive(Default)]
pub struct LoggerWriter {}

pub(crate) fn format_row(row: &RowMetaAndData) -> String {
    row.row_meta
        .value_metas()
        .iter()
        .zip(&row.data)
        .map(|(meta, value)| match value {
            Some(value) => format!("{}={}", meta.name, value),
            None => format!("{}=<null>", meta.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl ItemWriter<RowMetaAndData> for LoggerWriter {
    fn write(&self, items: &[RowMetaAndData]) -> Result<(), BatchError> {
        items.iter().for_each(|row| info!("Row:[{}]", format_row(row)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::row::{Value, ValueType};

    #[test]
    fn rows_are_formatted_with_field_names() {
        let mut row = RowMetaAndData::default()
            .with("id", Value::Integer(7))
            .with("active", Value::Boolean(true));
        row.add_value("label", ValueType::String, None);

        assert_eq!(format_row(&row), "id=7, active=Y, label=<null>");
    }

    #[test]
    fn writing_never_fails() {
        let writer = LoggerWriter::default();
        assert!(writer.write(&[RowMetaAndData::default()]).is_ok());
    }
}
