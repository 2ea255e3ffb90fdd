//! Printing relations as aligned tables.

use colored::Colorize;
use sarasate::management::database::Relation;

/// Render a relation with a header line and one line per row.
pub(crate) fn render(relation: &Relation) -> String {
    let header: Vec<&str> = relation.schema().names().collect();
    let cells: Vec<Vec<String>> = relation
        .rows()
        .map(|(_, values)| values.iter().map(ToString::to_string).collect())
        .collect();

    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(index, name)| {
            cells
                .iter()
                .map(|row| row[index].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(
        header
            .iter()
            .zip(&widths)
            .map(|(name, width)| format!("{name:<width$}").bold().to_string())
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in cells {
        lines.push(
            row.iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string(),
        );
    }

    lines.join("\n")
}
