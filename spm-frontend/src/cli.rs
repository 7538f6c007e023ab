use std::path::PathBuf;

use spm_config::AppConfig;
use spm_core::units::{Force, Length, UnitSettings};
use spm_engine::command::CommandBus;
use spm_engine::conditions::{Constraint, PlaneForce};
use spm_engine::structural::NodeType;
use spm_io::{DocumentSaver, JsonFacade};
use tracing::info;

use crate::errors::FrontendError;
use crate::loader::{DocumentSource, load_session};

/// CLI 运行参数。
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub config: AppConfig,
    /// 覆盖环境变量与配置中的图纸路径。
    pub drawing: Option<PathBuf>,
    /// 运行结束后把图纸写到该路径。
    pub save: Option<PathBuf>,
}

/// 简易 CLI 演示：加载图纸或构建示例模型，打印编号后的节点、桁条、面板。
pub fn run_demo(options: &CliOptions) -> Result<(), FrontendError> {
    let loaded = load_session(&options.config, options.drawing.as_deref());
    let session = loaded.session;

    let command_bus = CommandBus::new();
    let mut commands: Vec<&str> = command_bus.available_commands().copied().collect();
    commands.sort_unstable();
    println!("支持的命令: {}", commands.join(", "));

    let model = session.model();
    info!(
        nodes = model.nodes().len(),
        stringers = model.stringers().len(),
        panels = model.panels().len(),
        supports = model.constraints().len(),
        forces = model.forces().len(),
        primitives = session.host().entities().count(),
        "CLI 演示模型统计"
    );

    println!("Rust 版 SPM 模型 CLI 演示");
    match &loaded.source {
        DocumentSource::Json(path) => println!("已从图纸加载模型：{}", path.display()),
        DocumentSource::Demo => println!("已构建内置示例模型"),
    }

    let units = session.settings().units;
    let elements = session.elements();

    println!("节点：");
    for node in &elements.nodes {
        let mut line = format!(
            "  - 节点 {}: ({:.2}, {:.2}) {}",
            node.number,
            node.position.x(),
            node.position.y(),
            describe_node_type(node.kind)
        );
        if node.constraint != Constraint::Free {
            line.push_str(&format!(", 约束={}", describe_constraint(node.constraint)));
        }
        if !node.force.is_zero() {
            line.push_str(&format!(", 荷载={}", describe_force(&units, &node.force)));
        }
        println!("{line}");
    }

    println!("桁条：");
    for stringer in &elements.stringers {
        let [start, middle, end] = stringer.grips;
        println!(
            "  - 桁条 {}: 节点 {start}-{middle}-{end}, 长度={}, 角度={:.2}°, 截面={:.0}x{:.0} mm{}",
            stringer.number,
            describe_length(&units, stringer.length),
            stringer.angle.to_degrees(),
            stringer.cross_section.width.millimeters(),
            stringer.cross_section.height.millimeters(),
            if stringer.reinforcement.is_some() {
                ", 已配筋"
            } else {
                ""
            }
        );
    }

    println!("面板：");
    for panel in &elements.panels {
        let grips: Vec<String> = panel.grips.iter().map(usize::to_string).collect();
        println!(
            "  - 面板 {}: 节点 {}, 厚度={:.0} mm{}",
            panel.number,
            grips.join("-"),
            panel.width.millimeters(),
            if panel.reinforcement.is_some() {
                ", 已配筋"
            } else {
                ""
            }
        );
    }

    if let Some(path) = &options.save {
        JsonFacade::new().save(session.host(), path)?;
        info!(path = %path.display(), "图纸已保存");
        println!("图纸已保存到：{}", path.display());
    }
    Ok(())
}

fn describe_node_type(kind: NodeType) -> &'static str {
    match kind {
        NodeType::External => "端节点",
        NodeType::Internal => "中间节点",
    }
}

fn describe_constraint(constraint: Constraint) -> &'static str {
    match constraint {
        Constraint::Free => "自由",
        Constraint::XFixed => "X 向固定",
        Constraint::YFixed => "Y 向固定",
        Constraint::Fixed => "固定",
    }
}

fn describe_force(units: &UnitSettings, force: &PlaneForce) -> String {
    let component = |value: Force| {
        format!("{:.2} {}", units.force.from_force(value), units.force.symbol())
    };
    format!("Fx={}, Fy={}", component(force.x), component(force.y))
}

fn describe_length(units: &UnitSettings, length: Length) -> String {
    format!("{:.2} {}", units.length.from_length(length), units.length.symbol())
}
