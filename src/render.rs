use crate::calc::DisplayValue;
use crate::matrix::{CellContent, MatrixCell, MatrixRow, ReportMatrix, RowKind};
use crate::model::ItemKind;
use crate::tree::FillerPosition;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedTable {
    pub classes: Vec<String>,
    pub rows: Vec<RenderedRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedRow {
    pub classes: Vec<String>,
    pub cells: Vec<RenderedCell>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedCell {
    pub text: String,
    pub colspan: usize,
    pub header: bool,
    pub scope: Option<String>,
    pub classes: Vec<String>,
    pub id: Option<String>,
}

impl RenderedCell {
    fn new(text: impl Into<String>, colspan: usize) -> Self {
        Self {
            text: text.into(),
            colspan,
            header: false,
            scope: None,
            classes: Vec::new(),
            id: None,
        }
    }

    fn header(mut self, scope: &str) -> Self {
        self.header = true;
        self.scope = Some(scope.to_string());
        self
    }

    fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    fn class_if(self, cond: bool, class: &str) -> Self {
        if cond {
            self.class(class)
        } else {
            self
        }
    }
}

fn total_class(kind: ItemKind) -> Option<&'static str> {
    match kind {
        ItemKind::Course => Some("courseitem"),
        ItemKind::Category => Some("categoryitem"),
        _ => None,
    }
}

fn render_cell(cell: &MatrixCell) -> RenderedCell {
    match &cell.content {
        CellContent::FixedHeader { label } => RenderedCell::new(label, cell.span)
            .header("col")
            .class("header"),
        CellContent::LearnerHeader {
            user_id,
            name,
            suspended_in,
            picture,
            ..
        } => {
            let mut c = RenderedCell::new(name, cell.span)
                .header("col")
                .class("header")
                .class("user")
                .class_if(*picture, "userpic")
                .class_if(!suspended_in.is_empty(), "usersuspended");
            c.id = Some(format!("user{}", user_id));
            c
        }
        CellContent::Filler { position } => {
            let c = RenderedCell::new("", cell.span).class("filler");
            match position {
                Some(FillerPosition::First) => c.class("fillerfirst"),
                Some(FillerPosition::Last) => c.class("fillerlast"),
                _ => c,
            }
        }
        CellContent::CourseLink {
            course_id,
            shortname,
            hidden,
            ..
        } => {
            let mut c = RenderedCell::new(shortname, cell.span)
                .header("row")
                .class("category")
                .class_if(*hidden, "dimmed_text");
            c.id = Some(format!("course{}", course_id));
            c
        }
        CellContent::Teachers { names } => {
            RenderedCell::new(names.join("\n"), cell.span).class("teachers")
        }
        CellContent::ItemName {
            name, kind, hidden, ..
        } => {
            let c = RenderedCell::new(name, cell.span)
                .header("row")
                .class("item")
                .class_if(*hidden, "dimmed_text");
            match total_class(*kind) {
                Some(t) => c.class(t),
                None => c,
            }
        }
        CellContent::Empty => RenderedCell::new("", cell.span).class("cell"),
        CellContent::GradeMax { text } => RenderedCell::new(text, cell.span).class("grademax"),
        CellContent::Grade {
            user_id,
            item_id,
            display,
            overridden,
            excluded,
            hidden,
            pass,
            total,
            suspended,
            ..
        } => {
            let mut c = RenderedCell::new(display.text(), cell.span)
                .class("grade")
                .class_if(*overridden, "overridden")
                .class_if(*excluded, "excluded")
                .class_if(*pass == Some(true), "gradepass")
                .class_if(*pass == Some(false), "gradefail")
                .class_if(matches!(display, DisplayValue::Error), "gradingerror")
                .class_if(*hidden, "dimmed_text")
                .class_if(*suspended, "usersuspended");
            if let Some(t) = total.and_then(total_class) {
                c = c.class(t);
            }
            c.id = Some(format!("u{}i{}", user_id, item_id));
            c
        }
        CellContent::Absent { user_id } => {
            let mut c = RenderedCell::new("", cell.span).class("grade").class("absent");
            c.id = Some(format!("u{}absent", user_id));
            c
        }
    }
}

fn row_classes(row: &MatrixRow) -> Vec<String> {
    let kind = match row.kind {
        RowKind::Header => "heading",
        RowKind::Filler => "filler",
        RowKind::Category => "category",
        RowKind::Item => "item",
    };
    vec![kind.to_string(), format!("level{}", row.depth)]
}

pub fn render_table(matrix: &ReportMatrix) -> RenderedTable {
    RenderedTable {
        classes: vec!["gradestable".to_string(), "multicourse".to_string()],
        rows: matrix
            .rows
            .iter()
            .map(|row| RenderedRow {
                classes: row_classes(row),
                cells: row.cells.iter().map(render_cell).collect(),
            })
            .collect(),
    }
}

/// One string per column; spanned columns after the first are empty.
pub fn expand_colspans(table: &RenderedTable) -> Vec<Vec<String>> {
    table
        .rows
        .iter()
        .map(|row| {
            let mut out = Vec::new();
            for cell in &row.cells {
                out.push(cell.text.clone());
                for _ in 1..cell.colspan {
                    out.push(String::new());
                }
            }
            out
        })
        .collect()
}

fn md_escape(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', "; ")
}

/// Markdown rendering of the matrix, header row first.
pub fn render_text(matrix: &ReportMatrix) -> String {
    let grid = expand_colspans(&render_table(matrix));
    let mut out = String::new();
    for (i, row) in grid.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|c| md_escape(c)).collect();
        out.push_str("| ");
        out.push_str(&cells.join(" | "));
        out.push_str(" |\n");
        if i == 0 {
            out.push('|');
            for _ in 0..row.len() {
                out.push_str("---|");
            }
            out.push('\n');
        }
    }
    out
}
