use std::io::{self, IsTerminal, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};
use mergebot::{ActionPlan, BotInput, DisplayMode, Evaluation, RecordedMutation};

const TABLE_HEADERS: &[&str] = &["PR", "KIND", "COLUMN", "MERGE", "CLOSE", "COMMENTS", "LABELS"];
const LABELS_COLUMN_INDEX: usize = TABLE_HEADERS.len() - 1;
const COLUMN_SEPARATOR: &str = "  ";
const TRUNCATION_SUFFIX: &str = "...";
const MIN_LABELS_WIDTH_FOR_TRUNCATION: usize = 3;
const TERMINAL_WIDTH_ENV: &str = "MERGEBOT_TERMINAL_WIDTH";

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

fn check_mark(value: bool) -> &'static str {
    if value { "✓" } else { "✗" }
}

/// Relative to the snapshot's own clock, so output does not drift between
/// runs.
fn format_relative_time(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    use chrono_humanize::HumanTime;
    HumanTime::from(time - now).to_string()
}

fn get_terminal_width(width_override: Option<usize>) -> usize {
    if let Some(width) = width_override {
        return width;
    }

    if let Some(width) = std::env::var(TERMINAL_WIDTH_ENV)
        .ok()
        .and_then(|w| w.trim().parse().ok())
    {
        return width;
    }

    if io::stdout().is_terminal() {
        terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(usize::MAX)
    } else {
        usize::MAX
    }
}

fn column_cell(plan: &ActionPlan) -> String {
    if plan.should_remove_from_active_columns {
        return "(removed)".to_string();
    }
    match (plan.target_column, plan.should_update_project_column) {
        (Some(column), true) => column.to_string(),
        (Some(column), false) => format!("({column})"),
        (None, _) => "-".to_string(),
    }
}

fn labels_cell(plan: &ActionPlan) -> String {
    let labels: Vec<_> = plan.active_labels().map(|l| l.as_str()).collect();
    match (labels.is_empty(), plan.should_update_labels) {
        (true, _) => "-".to_string(),
        (false, true) => labels.join(", "),
        (false, false) => format!("({})", labels.join(", ")),
    }
}

fn evaluation_to_table_row(evaluation: &Evaluation) -> Vec<String> {
    let plan = &evaluation.plan;
    let tags: Vec<_> = plan.comments.iter().map(|c| c.tag.as_str()).collect();

    vec![
        format!("#{}", plan.pr_number),
        evaluation.input.kind().to_string(),
        column_cell(plan),
        check_mark(plan.should_merge).to_string(),
        check_mark(plan.should_close).to_string(),
        if tags.is_empty() {
            "-".to_string()
        } else {
            tags.join(",")
        },
        labels_cell(plan),
    ]
}

fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    widths
}

fn truncate_chars(text: &str, width: usize) -> String {
    let keep = width.saturating_sub(TRUNCATION_SUFFIX.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}

fn apply_labels_truncation(rows: &mut [Vec<String>], widths: &mut [usize], terminal_width: usize) {
    if terminal_width == usize::MAX {
        return;
    }

    let separator_width = COLUMN_SEPARATOR.len() * (widths.len() - 1);
    let fixed_width: usize = widths[..LABELS_COLUMN_INDEX].iter().sum::<usize>() + separator_width;

    if fixed_width >= terminal_width {
        return;
    }

    let available = terminal_width - fixed_width;
    if widths[LABELS_COLUMN_INDEX] <= available || available <= MIN_LABELS_WIDTH_FOR_TRUNCATION {
        return;
    }

    widths[LABELS_COLUMN_INDEX] = available;
    for row in rows {
        if let Some(labels) = row.get_mut(LABELS_COLUMN_INDEX)
            && labels.chars().count() > available
        {
            *labels = truncate_chars(labels, available);
        }
    }
}

fn write_padded<W: Write>(writer: &mut W, cell: &str, width: usize) -> Result<()> {
    let pad = width.saturating_sub(cell.chars().count());
    write!(writer, "{cell}{}", " ".repeat(pad))?;
    Ok(())
}

fn render_table_headers<W: Write>(
    headers: &[&str],
    widths: &[usize],
    writer: &mut W,
) -> Result<()> {
    for (i, header) in headers.iter().enumerate() {
        if i < headers.len() - 1 {
            write_padded(writer, header, widths[i])?;
            write!(writer, "{COLUMN_SEPARATOR}")?;
        } else {
            write!(writer, "{header}")?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

fn render_table_separator<W: Write>(widths: &[usize], writer: &mut W) -> Result<()> {
    let line = widths
        .iter()
        .map(|&width| "-".repeat(width))
        .collect::<Vec<_>>()
        .join(COLUMN_SEPARATOR);
    writeln!(writer, "{line}")?;
    Ok(())
}

fn render_table_rows<W: Write>(
    rows: &[Vec<String>],
    widths: &[usize],
    writer: &mut W,
) -> Result<()> {
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < row.len() - 1 {
                write_padded(writer, cell, widths[i])?;
                write!(writer, "{COLUMN_SEPARATOR}")?;
            } else {
                write!(writer, "{cell}")?;
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn display_plans_table_with_width<W: Write>(
    evaluations: &[Evaluation],
    writer: &mut W,
    width_override: Option<usize>,
) -> Result<()> {
    let terminal_width = get_terminal_width(width_override);
    let mut rows: Vec<_> = evaluations.iter().map(evaluation_to_table_row).collect();
    let mut widths = calculate_column_widths(TABLE_HEADERS, &rows);

    apply_labels_truncation(&mut rows, &mut widths, terminal_width);

    render_table_headers(TABLE_HEADERS, &widths, writer)?;
    render_table_separator(&widths, writer)?;
    render_table_rows(&rows, &widths, writer)?;

    Ok(())
}

fn display_plans_quiet<W: Write>(evaluations: &[Evaluation], writer: &mut W) -> Result<()> {
    for evaluation in evaluations {
        writeln!(writer, "{}", evaluation.plan.pr_number)?;
    }
    Ok(())
}

fn display_plans_json<W: Write>(evaluations: &[Evaluation], writer: &mut W) -> Result<()> {
    let plans: Vec<&ActionPlan> = evaluations.iter().map(|e| &e.plan).collect();
    serde_json::to_writer_pretty(&mut *writer, &plans)?;
    writeln!(writer)?;
    Ok(())
}

struct PlanDetailFormatter<'a> {
    evaluation: &'a Evaluation,
}

impl<'a> PlanDetailFormatter<'a> {
    fn new(evaluation: &'a Evaluation) -> Self {
        Self { evaluation }
    }

    fn format<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.write_header(writer)?;
        self.write_metadata(writer)?;
        self.write_decision_section(writer)?;
        self.write_labels_section(writer)?;
        self.write_comments_section(writer)?;
        Ok(())
    }

    fn write_header<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(
            writer,
            "● PR #{} ({})",
            self.evaluation.plan.pr_number,
            self.evaluation.input.kind()
        )?;
        Ok(())
    }

    fn write_metadata<W: Write>(&self, writer: &mut W) -> Result<()> {
        match &self.evaluation.input {
            BotInput::Info(info) => {
                writeln!(writer, "├─Author: {}", info.author)?;
                writeln!(writer, "├─Packages: {}", info.packages.join(", "))?;
                writeln!(
                    writer,
                    "├─Last push: {}",
                    format_relative_time(info.last_push_date, info.now)
                )?;
                writeln!(writer, "├─Review: {}", info.review_link)?;
            }
            BotInput::Error {
                author, message, ..
            } => {
                writeln!(writer, "├─Author: {author}")?;
                writeln!(writer, "├─Error: {message}")?;
            }
            BotInput::Remove { is_draft, .. } => {
                writeln!(writer, "├─Draft: {}", yes_no(*is_draft))?;
            }
            BotInput::NoPackages { .. } => {}
        }
        Ok(())
    }

    fn write_decision_section<W: Write>(&self, writer: &mut W) -> Result<()> {
        let plan = &self.evaluation.plan;
        writeln!(writer, "├─Decision")?;
        writeln!(writer, "│ ├─Column: {}", column_cell(plan))?;
        writeln!(writer, "│ ├─Update labels: {}", yes_no(plan.should_update_labels))?;
        writeln!(
            writer,
            "│ ├─Update column: {}",
            yes_no(plan.should_update_project_column)
        )?;
        writeln!(
            writer,
            "│ ├─Ready for auto-merge: {}",
            yes_no(plan.is_ready_for_auto_merge)
        )?;
        writeln!(writer, "│ ├─Merge: {}", yes_no(plan.should_merge))?;
        writeln!(writer, "│ └─Close: {}", yes_no(plan.should_close))?;
        Ok(())
    }

    fn write_labels_section<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "├─Labels")?;

        let labels: Vec<_> = self.evaluation.plan.active_labels().collect();
        if labels.is_empty() {
            writeln!(writer, "│ └─None")?;
        } else {
            for (i, label) in labels.iter().enumerate() {
                let prefix = if i == labels.len() - 1 {
                    "│ └─"
                } else {
                    "│ ├─"
                };
                writeln!(writer, "{prefix}{label}")?;
            }
        }

        Ok(())
    }

    fn write_comments_section<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "└─Comments")?;

        let comments = &self.evaluation.plan.comments;
        if comments.is_empty() {
            writeln!(writer, "  └─None")?;
            return Ok(());
        }

        for (i, comment) in comments.iter().enumerate() {
            let is_last = i == comments.len() - 1;
            let (tag_prefix, body_prefix) = if is_last {
                ("  └─", "    ")
            } else {
                ("  ├─", "  │ ")
            };
            writeln!(writer, "{tag_prefix}{}", comment.tag)?;
            for line in comment.body.lines() {
                writeln!(writer, "{body_prefix}{line}")?;
            }
        }

        Ok(())
    }
}

fn display_plans_detailed<W: Write>(evaluations: &[Evaluation], writer: &mut W) -> Result<()> {
    for (i, evaluation) in evaluations.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        PlanDetailFormatter::new(evaluation).format(writer)?;
    }
    Ok(())
}

pub fn display_plans<W: Write>(
    evaluations: &[Evaluation],
    mode: DisplayMode,
    writer: &mut W,
) -> Result<()> {
    match mode {
        DisplayMode::Quiet => display_plans_quiet(evaluations, writer),
        DisplayMode::Detailed => display_plans_detailed(evaluations, writer),
        DisplayMode::Json => display_plans_json(evaluations, writer),
        DisplayMode::Normal => display_plans_table_with_width(evaluations, writer, None),
    }
}

pub fn output_mutations<W: Write>(mutations: &[RecordedMutation], writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, mutations)?;
    writeln!(writer)?;
    Ok(())
}
