use crate::app::{App, AppView, Panel};
use prospeed::settings::SettingsField;
use prospeed::speedtest::{MeasurementKind, TestPhase};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

const ACCENT: Color = Color::Rgb(100, 149, 237);
const SUCCESS: Color = Color::Rgb(134, 194, 156);
const SUCCESS_DIM: Color = Color::Rgb(80, 120, 90);
const INFO: Color = Color::Rgb(147, 180, 220);
const INFO_DIM: Color = Color::Rgb(90, 110, 140);
const WARN: Color = Color::Rgb(220, 180, 130);
const WARN_DIM: Color = Color::Rgb(130, 110, 80);
const ERROR: Color = Color::Rgb(224, 108, 117);
const TEXT_PRIMARY: Color = Color::Rgb(230, 230, 230);
const TEXT_SECONDARY: Color = Color::Rgb(160, 160, 160);
const TEXT_MUTED: Color = Color::Rgb(100, 100, 100);
const BORDER: Color = Color::Rgb(60, 60, 65);
const BORDER_ACTIVE: Color = Color::Rgb(100, 100, 110);

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let area = frame.area();

    match app.view {
        AppView::Main => {
            if app.expanded {
                draw_expanded_view(frame, area, app);
            } else {
                draw_normal_view(frame, area, app);
            }
        }
        AppView::Settings => {
            draw_settings_view(frame, area, app);
        }
    }
}

fn draw_normal_view(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(8),
        Constraint::Length(2),
        Constraint::Length(8),
        Constraint::Length(1),
    ])
    .split(area);

    draw_header(frame, chunks[0], app);

    let panels = Layout::horizontal([
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
    ])
    .split(chunks[1]);

    draw_metric_panel(frame, panels[0], app, MeasurementKind::Download, app.selected_panel == Panel::Download);
    draw_metric_panel(frame, panels[1], app, MeasurementKind::Upload, app.selected_panel == Panel::Upload);
    draw_metric_panel(frame, panels[2], app, MeasurementKind::Ping, app.selected_panel == Panel::Ping);

    draw_connection_info(frame, chunks[2], app);
    draw_log(frame, chunks[3], app);
    draw_help(frame, chunks[4], app);
}

fn draw_expanded_view(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(8),
        Constraint::Length(1),
    ])
    .split(area);

    draw_header(frame, chunks[0], app);

    let kind = match app.selected_panel {
        Panel::Download => MeasurementKind::Download,
        Panel::Upload => MeasurementKind::Upload,
        Panel::Ping => MeasurementKind::Ping,
    };
    draw_expanded_metric(frame, chunks[1], app, kind);

    draw_help(frame, chunks[2], app);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(BORDER));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::horizontal([
        Constraint::Length(12),
        Constraint::Min(10),
        Constraint::Length(28),
    ])
    .split(inner);

    let title = Paragraph::new("prospeed")
        .style(Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD));
    frame.render_widget(title, chunks[0]);

    let (status, color) = match app.phase {
        TestPhase::Idle if app.completed => match app.delivered {
            Some(false) => ("Complete · results not delivered", ERROR),
            _ => ("Complete", ACCENT),
        },
        TestPhase::Idle => ("Ready", TEXT_MUTED),
        TestPhase::Ping => ("Measuring latency...", WARN),
        TestPhase::Download => ("Testing download...", SUCCESS),
        TestPhase::Upload => ("Testing upload...", INFO),
        TestPhase::Reporting => ("Sending results...", ACCENT),
    };

    let status_text = Paragraph::new(status)
        .style(Style::default().fg(color))
        .alignment(Alignment::Center);
    frame.render_widget(status_text, chunks[1]);

    frame.render_widget(
        Paragraph::new(create_phase_text(app)).alignment(Alignment::Right),
        chunks[2],
    );
}

fn create_phase_text(app: &App) -> Line<'static> {
    let phases = [
        (MeasurementKind::Ping, TestPhase::Ping, "ping"),
        (MeasurementKind::Download, TestPhase::Download, "down"),
        (MeasurementKind::Upload, TestPhase::Upload, "up"),
    ];

    let mut spans = Vec::new();

    for (i, (kind, phase, label)) in phases.iter().enumerate() {
        let style = if app.phase == *phase {
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
        } else {
            match app.result(*kind) {
                Some(m) if !m.is_ok() => Style::default().fg(ERROR),
                Some(_) => Style::default().fg(TEXT_SECONDARY),
                None => Style::default().fg(TEXT_MUTED),
            }
        };

        spans.push(Span::styled(*label, style));

        if i < phases.len() - 1 {
            spans.push(Span::styled(" / ", Style::default().fg(TEXT_MUTED)));
        }
    }

    spans.push(Span::styled(
        format!("  {}s", app.settings.duration_secs),
        Style::default().fg(TEXT_SECONDARY),
    ));

    Line::from(spans)
}

fn palette(kind: MeasurementKind) -> (&'static str, Color, Color) {
    match kind {
        MeasurementKind::Download => ("Download", SUCCESS, SUCCESS_DIM),
        MeasurementKind::Upload => ("Upload", INFO, INFO_DIM),
        MeasurementKind::Ping => ("Latency", WARN, WARN_DIM),
    }
}

fn draw_metric_panel(frame: &mut Frame, area: Rect, app: &App, kind: MeasurementKind, selected: bool) {
    let (title, color, dim_color) = palette(kind);
    let border_color = if selected { BORDER_ACTIVE } else { BORDER };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(if selected { color } else { TEXT_SECONDARY }),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Min(3),
    ])
    .split(inner);

    let (value, value_color) = current_value(app, kind);
    frame.render_widget(
        Paragraph::new(value)
            .style(Style::default().fg(value_color).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center),
        chunks[0],
    );

    draw_progress_bar(frame, chunks[1], app.panel_progress(kind), color, dim_color);

    let samples = samples_for(app, kind);
    if !samples.is_empty() {
        draw_sparkline(frame, chunks[2], samples, color);
    }
}

fn draw_progress_bar(frame: &mut Frame, area: Rect, ratio: f64, color: Color, dim_color: Color) {
    if area.width < 4 {
        return;
    }

    let width = (area.width - 2) as usize;
    let filled = ((ratio.clamp(0.0, 1.0) * width as f64) as usize).min(width);
    let empty = width.saturating_sub(filled);

    let bar = Line::from(vec![
        Span::raw(" "),
        Span::styled("━".repeat(filled), Style::default().fg(color)),
        Span::styled("━".repeat(empty), Style::default().fg(dim_color)),
        Span::raw(" "),
    ]);

    frame.render_widget(Paragraph::new(bar), area);
}

fn draw_sparkline(frame: &mut Frame, area: Rect, data: &[f64], color: Color) {
    if data.is_empty() || area.width < 4 || area.height < 2 {
        return;
    }

    let (min_val, max_val) = get_data_range(data);
    let range = (max_val - min_val).max(1.0);

    let points: Vec<(f64, f64)> = data
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v))
        .collect();

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .x_axis(Axis::default().bounds([0.0, data.len() as f64]))
        .y_axis(Axis::default().bounds([min_val - range * 0.1, max_val + range * 0.1]));

    frame.render_widget(chart, area);
}

fn draw_expanded_metric(frame: &mut Frame, area: Rect, app: &App, kind: MeasurementKind) {
    let (title, color, dim_color) = palette(kind);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_ACTIVE))
        .title(Span::styled(format!(" {} ", title), Style::default().fg(color)));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Min(4),
    ])
    .split(inner);

    let samples = samples_for(app, kind);
    let (value, value_color) = current_value(app, kind);
    let mut spans = vec![Span::styled(
        value,
        Style::default().fg(value_color).add_modifier(Modifier::BOLD),
    )];
    if !samples.is_empty() {
        let (avg, max, min) = get_stats(samples);
        for label in [
            format!("avg {}", format_speed(avg)),
            format!("max {}", format_speed(max)),
            format!("min {}", format_speed(min)),
        ] {
            spans.push(Span::styled("  ·  ", Style::default().fg(TEXT_MUTED)));
            spans.push(Span::styled(label, Style::default().fg(TEXT_MUTED)));
        }
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).alignment(Alignment::Center), chunks[0]);

    draw_progress_bar(frame, chunks[1], app.panel_progress(kind), color, dim_color);

    draw_detailed_chart(frame, chunks[2], samples, color, "Mbps");
}

fn draw_detailed_chart(frame: &mut Frame, area: Rect, data: &[f64], color: Color, unit: &str) {
    if data.is_empty() || area.width < 10 || area.height < 3 {
        return;
    }

    let (min_val, max_val) = get_data_range(data);
    let range = (max_val - min_val).max(0.1);
    let y_min = (min_val - range * 0.1).max(0.0);
    let y_max = max_val + range * 0.1;

    let points: Vec<(f64, f64)> = data
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v))
        .collect();

    let (avg, _, _) = get_stats(data);
    let avg_line: Vec<(f64, f64)> = vec![(0.0, avg), (data.len() as f64, avg)];

    let datasets = vec![
        Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(color))
            .data(&points),
        Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(TEXT_MUTED))
            .data(&avg_line),
    ];

    let y_labels = vec![
        Span::styled(format!("{:.0}", y_min), Style::default().fg(TEXT_MUTED)),
        Span::styled(format!("{:.0} {}", y_max, unit), Style::default().fg(TEXT_MUTED)),
    ];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(BORDER))
                .bounds([0.0, data.len() as f64]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(BORDER))
                .bounds([y_min, y_max])
                .labels(y_labels),
        );

    frame.render_widget(chart, area);
}

fn draw_connection_info(frame: &mut Frame, area: Rect, app: &App) {
    let network = app
        .network_type
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unavailable".to_string());

    let label = Style::default().fg(TEXT_MUTED);
    let value = Style::default().fg(TEXT_SECONDARY);
    let lines = vec![
        Line::from(vec![
            Span::styled(" client ", label),
            Span::styled(app.geo.user.to_string(), value),
            Span::styled("   server ", label),
            Span::styled(app.geo.server.to_string(), value),
        ]),
        Line::from(vec![
            Span::styled(" network ", label),
            Span::styled(network, value),
            Span::styled("   endpoint ", label),
            Span::styled(app.settings.server_url.clone(), value),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_log(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(BORDER))
        .title(Span::styled(" Log ", Style::default().fg(TEXT_SECONDARY)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Follow the tail
    let visible = inner.height as usize;
    let start = app.log_lines.len().saturating_sub(visible);
    let lines: Vec<Line> = app.log_lines[start..]
        .iter()
        .map(|line| {
            let style = if line.contains("error") || line.contains("Could not") {
                Style::default().fg(ERROR)
            } else {
                Style::default().fg(TEXT_MUTED)
            };
            Line::from(Span::styled(line.clone(), style))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

// Settings
fn draw_settings_view(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(10),
        Constraint::Length(1),
    ])
    .split(area);

    let header_block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(BORDER));
    let header_inner = header_block.inner(chunks[0]);
    frame.render_widget(header_block, chunks[0]);

    frame.render_widget(
        Paragraph::new("Settings")
            .style(Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD)),
        header_inner,
    );

    let content_area = Layout::horizontal([
        Constraint::Length(2),
        Constraint::Min(30),
        Constraint::Length(2),
    ])
    .split(chunks[1])[1];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER));
    let inner = block.inner(content_area);
    frame.render_widget(block, content_area);

    let rows = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .split(inner);

    draw_setting_row(
        frame,
        rows[0],
        "Test duration",
        &format!("{} s", app.settings.duration_secs),
        app.selected_setting == SettingsField::Duration,
    );

    draw_setting_row(
        frame,
        rows[1],
        "Download size",
        &format!("{} MiB", app.settings.download_size_mib),
        app.selected_setting == SettingsField::DownloadSize,
    );

    draw_setting_row(
        frame,
        rows[2],
        "Upload chunk",
        &format!("{} KiB", app.settings.upload_chunk_kib),
        app.selected_setting == SettingsField::UploadChunk,
    );

    let help = "↑↓ select · ←→ adjust · enter done";
    frame.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(TEXT_MUTED))
            .alignment(Alignment::Center),
        chunks[2],
    );
}

fn draw_setting_row(frame: &mut Frame, area: Rect, label: &str, value: &str, selected: bool) {
    let chunks = Layout::horizontal([
        Constraint::Length(16),
        Constraint::Min(10),
    ])
    .split(area);

    let label_style = if selected {
        Style::default().fg(ACCENT)
    } else {
        Style::default().fg(TEXT_SECONDARY)
    };

    frame.render_widget(
        Paragraph::new(format!(" {}", label)).style(label_style),
        chunks[0],
    );

    let value_text = if selected {
        format!("< {} >", value)
    } else {
        value.to_string()
    };

    let value_style = if selected {
        Style::default().fg(TEXT_PRIMARY)
    } else {
        Style::default().fg(TEXT_MUTED)
    };

    frame.render_widget(Paragraph::new(value_text).style(value_style), chunks[1]);
}

fn draw_help(frame: &mut Frame, area: Rect, app: &App) {
    let help = if app.expanded {
        "esc close · q quit"
    } else if app.is_idle() {
        "enter start · +/- duration · s settings · tab select · space expand · q quit"
    } else {
        "+/- duration · tab select · space expand · esc cancel · q quit"
    };

    frame.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(TEXT_MUTED))
            .alignment(Alignment::Center),
        area,
    );
}

// Helpers
fn samples_for(app: &App, kind: MeasurementKind) -> &[f64] {
    match kind {
        MeasurementKind::Download => &app.download_samples,
        MeasurementKind::Upload => &app.upload_samples,
        MeasurementKind::Ping => &[],
    }
}

fn current_value(app: &App, kind: MeasurementKind) -> (String, Color) {
    if let Some(result) = app.result(kind) {
        let color = if result.is_ok() { TEXT_PRIMARY } else { ERROR };
        return (result.display(), color);
    }
    let live = samples_for(app, kind).last().copied().unwrap_or(0.0);
    (format_speed(live), TEXT_PRIMARY)
}

fn get_data_range(data: &[f64]) -> (f64, f64) {
    let min = data.iter().cloned().fold(f64::MAX, f64::min);
    let max = data.iter().cloned().fold(f64::MIN, f64::max);
    (if min == f64::MAX { 0.0 } else { min }, if max == f64::MIN { 0.0 } else { max })
}

fn get_stats(data: &[f64]) -> (f64, f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let avg = data.iter().sum::<f64>() / data.len() as f64;
    let (min, max) = get_data_range(data);
    (avg, max, min)
}

fn format_speed(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.1} Gbps", mbps / 1000.0)
    } else if mbps >= 1.0 {
        format!("{:.1} Mbps", mbps)
    } else if mbps > 0.0 {
        format!("{:.0} Kbps", mbps * 1000.0)
    } else {
        "—".to_string()
    }
}
