use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use ci_scope::triggers::{ChangeTrigger, Pipeline};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn pipelines_table(pipelines: &[&Pipeline]) -> Table {
    let mut table = create_table();
    table.set_header(
        ["Pipeline", "Entrypoint", "Triggers"]
            .iter()
            .map(|label| Cell::new(*label).fg(TableColor::Cyan)),
    );

    for pipeline in pipelines {
        table.add_row(vec![
            Cell::new(&pipeline.name),
            Cell::new(&pipeline.entrypoint),
            triggers_cell(&pipeline.triggers),
        ]);
    }

    table
}

fn triggers_cell(triggers: &[ChangeTrigger]) -> Cell {
    if triggers.is_empty() {
        return Cell::new("always").fg(TableColor::Green);
    }

    let lines: Vec<String> = triggers.iter().map(describe_trigger).collect();
    Cell::new(lines.join("\n"))
}

fn describe_trigger(trigger: &ChangeTrigger) -> String {
    match (trigger.include.is_empty(), trigger.all_except.is_empty()) {
        (true, true) => "any change".to_string(),
        (false, true) => trigger.include.join(", "),
        (true, false) => format!("all except {}", trigger.all_except.join(", ")),
        (false, false) => format!(
            "{} (all except {})",
            trigger.include.join(", "),
            trigger.all_except.join(", ")
        ),
    }
}
