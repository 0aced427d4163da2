use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, warn};

use crate::model::{Cell, PageContent, RawRow, StatementPage};
use crate::warning::{ConvertWarning, WarningCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageRows {
    pub page: u32,
    pub rows: Vec<RawRow>,
    pub warning: Option<ConvertWarning>,
}

/// Splits a line on tabs and on whitespace runs of two or more characters.
/// Each cell keeps the character offset where it starts.
pub(crate) fn split_line_into_cells(line: &str) -> Vec<Cell> {
    fn flush(current: &mut String, start: usize, cells: &mut Vec<Cell>) {
        if current.is_empty() {
            return;
        }
        let text = std::mem::take(current);
        cells.push(Cell {
            width: text.chars().count(),
            text,
            column: start,
        });
    }

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut start = 0_usize;
    let mut whitespace_run = 0_usize;

    for (column, ch) in line.chars().enumerate() {
        if ch == '\t' {
            flush(&mut current, start, &mut cells);
            whitespace_run = 0;
            continue;
        }

        if ch.is_whitespace() {
            whitespace_run += 1;
            if whitespace_run >= 2 {
                flush(&mut current, start, &mut cells);
            }
            continue;
        }

        if current.is_empty() {
            start = column;
        } else if whitespace_run == 1 {
            current.push(' ');
        }
        whitespace_run = 0;
        current.push(ch);
    }

    flush(&mut current, start, &mut cells);
    cells
}

fn table_row_cells(row: &[String]) -> Vec<Cell> {
    row.iter()
        .enumerate()
        .filter_map(|(index, text)| {
            let text = text.trim();
            (!text.is_empty()).then(|| Cell {
                text: text.to_string(),
                column: index,
                width: 1,
            })
        })
        .collect()
}

pub(crate) fn extract_page(page: &StatementPage) -> PageRows {
    let page_number = page.page_number;
    let lines: Vec<Vec<Cell>> = match &page.content {
        PageContent::Text(text) => text.lines().map(split_line_into_cells).collect(),
        PageContent::Table(rows) => rows.iter().map(|row| table_row_cells(row)).collect(),
        PageContent::Undecodable(reason) => {
            warn!(page = page_number, %reason, "page could not be decoded");
            return PageRows {
                page: page_number,
                rows: Vec::new(),
                warning: Some(
                    ConvertWarning::new(
                        WarningCode::PageDecodeFailure,
                        format!("page could not be decoded: {reason}"),
                    )
                    .with_page(page_number),
                ),
            };
        }
    };

    let rows = lines
        .into_iter()
        .enumerate()
        .filter(|(_, cells)| !cells.is_empty())
        .map(|(line, cells)| RawRow {
            page: page_number,
            line,
            cells,
        })
        .collect::<Vec<_>>();

    PageRows {
        page: page_number,
        rows,
        warning: None,
    }
}

/// Extracts every page in parallel, then restores statement order
/// (page order, then line order) before anything downstream sees the rows.
pub(crate) fn extract_pages(pages: &[StatementPage]) -> (Vec<RawRow>, Vec<ConvertWarning>) {
    let mut extracted = pages
        .par_iter()
        .enumerate()
        .map(|(ordinal, page)| (ordinal, extract_page(page)))
        .collect::<Vec<_>>();
    extracted.sort_by_key(|(ordinal, _)| *ordinal);

    let mut rows = Vec::new();
    let mut warnings = Vec::new();
    for (_, mut page) in extracted {
        page.rows.sort_by_key(|row| row.line);
        debug!(page = page.page, rows = page.rows.len(), "extracted page");
        rows.extend(page.rows);
        warnings.extend(page.warning);
    }

    (rows, warnings)
}

#[cfg(test)]
mod tests {
    use super::{extract_pages, split_line_into_cells};
    use crate::model::StatementPage;
    use crate::warning::WarningCode;

    fn texts(line: &str) -> Vec<String> {
        split_line_into_cells(line)
            .into_iter()
            .map(|cell| cell.text)
            .collect()
    }

    #[test]
    fn splits_double_space_separated_cells() {
        assert_eq!(
            texts("05-02-2024  Card payment  12.00  988.00"),
            vec!["05-02-2024", "Card payment", "12.00", "988.00"]
        );
    }

    #[test]
    fn splits_tab_separated_cells() {
        assert_eq!(texts("A\tB\tC"), vec!["A", "B", "C"]);
    }

    #[test]
    fn records_cell_offsets() {
        let cells = split_line_into_cells("  Date    Debit");
        assert_eq!(cells[0].column, 2);
        assert_eq!(cells[1].column, 10);
        assert_eq!(cells[1].width, 5);
    }

    #[test]
    fn keeps_page_then_line_order_and_warns_on_bad_pages() {
        let pages = vec![
            StatementPage::text(1, "a  1\n\nb  2"),
            StatementPage::undecodable(2, "broken font encoding"),
            StatementPage::table(3, vec![vec!["c".to_string(), String::new(), "3".to_string()]]),
        ];

        let (rows, warnings) = extract_pages(&pages);
        let order = rows
            .iter()
            .map(|row| (row.page, row.line))
            .collect::<Vec<_>>();
        assert_eq!(order, vec![(1, 0), (1, 2), (3, 0)]);
        assert_eq!(rows[2].cells[1].column, 2);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::PageDecodeFailure);
        assert_eq!(warnings[0].page, Some(2));
    }
}
