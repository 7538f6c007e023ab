use std::collections::HashMap;

use spm_core::document::Document;
use spm_core::geometry::{Point2, Quad, Segment};
use spm_core::units::Length;

use crate::attributes::CrossSection;
use crate::conditions::{Constraint, PlaneForce};
use crate::errors::EngineError;
use crate::session::Session;
use crate::structural::{PanelObject, StringerObject};

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

impl From<EngineError> for CommandResponse {
    fn from(error: EngineError) -> Self {
        CommandResponse::err(error.to_string())
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut Session<Document>,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(AddStringerCommand);
        bus.register(RemoveStringerCommand);
        bus.register(DivideStringerCommand);
        bus.register(AddPanelCommand);
        bus.register(DividePanelCommand);
        bus.register(SetConstraintCommand);
        bus.register(SetForceCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

fn number(request: &CommandRequest, index: usize) -> Result<f64, EngineError> {
    let arg = request.args.get(index).ok_or_else(|| {
        EngineError::InvalidArgument(format!("{} 缺少第 {} 个参数", request.name, index + 1))
    })?;
    let value = arg
        .parse::<f64>()
        .map_err(|_| EngineError::InvalidArgument(format!("无法解析数值: {arg}")))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::InvalidArgument(format!("数值必须为有限值: {arg}")))
    }
}

fn count(request: &CommandRequest, index: usize) -> Result<usize, EngineError> {
    let arg = request.args.get(index).ok_or_else(|| {
        EngineError::InvalidArgument(format!("{} 缺少第 {} 个参数", request.name, index + 1))
    })?;
    arg.parse::<usize>()
        .map_err(|_| EngineError::InvalidArgument(format!("无法解析数量: {arg}")))
}

fn point(request: &CommandRequest, index: usize) -> Result<Point2, EngineError> {
    Ok(Point2::new(
        number(request, index)?,
        number(request, index + 1)?,
    ))
}

fn segment(request: &CommandRequest) -> Result<Segment, EngineError> {
    Ok(Segment::new(point(request, 0)?, point(request, 2)?))
}

fn quad(request: &CommandRequest) -> Result<Quad, EngineError> {
    Ok(Quad::new([
        point(request, 0)?,
        point(request, 2)?,
        point(request, 4)?,
        point(request, 6)?,
    ]))
}

fn constraint(arg: Option<&String>) -> Result<Constraint, EngineError> {
    match arg.map(String::as_str) {
        Some("free") => Ok(Constraint::Free),
        Some("x") => Ok(Constraint::XFixed),
        Some("y") => Ok(Constraint::YFixed),
        Some("xy") => Ok(Constraint::Fixed),
        Some(other) => Err(EngineError::InvalidArgument(format!(
            "未知约束类型: {other}"
        ))),
        None => Err(EngineError::InvalidArgument("缺少约束类型".to_string())),
    }
}

fn outcome(applied: bool, done: String, skipped: &str) -> CommandResponse {
    if applied {
        CommandResponse::ok(done)
    } else {
        CommandResponse::err(skipped)
    }
}

/// `add_stringer x1 y1 x2 y2 [width height]`
struct AddStringerCommand;

impl AddStringerCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let geometry = segment(request)?;
        let cross_section = if request.args.len() >= 6 {
            CrossSection::new(number(request, 4)?, number(request, 5)?)
        } else {
            CrossSection::default()
        };
        let applied = context
            .session
            .add_stringer(StringerObject::from_segment(geometry, cross_section));
        Ok(outcome(
            applied,
            format!("已添加桁条，当前共 {} 根", context.session.model().stringers().len()),
            "桁条已存在或长度为零",
        ))
    }
}

impl CommandHandler for AddStringerCommand {
    fn name(&self) -> &'static str {
        "add_stringer"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        Self::run(request, context).unwrap_or_else(CommandResponse::from)
    }
}

/// `remove_stringer x1 y1 x2 y2`
struct RemoveStringerCommand;

impl CommandHandler for RemoveStringerCommand {
    fn name(&self) -> &'static str {
        "remove_stringer"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match segment(request) {
            Ok(geometry) => outcome(
                context.session.remove_stringer(&geometry),
                "已删除桁条".to_string(),
                "找不到桁条",
            ),
            Err(err) => err.into(),
        }
    }
}

/// `divide_stringer x1 y1 x2 y2 n`
struct DivideStringerCommand;

impl DivideStringerCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let geometry = segment(request)?;
        let pieces = count(request, 4)?;
        Ok(outcome(
            context.session.divide_stringer(&geometry, pieces),
            format!("桁条已等分为 {pieces} 段"),
            "找不到桁条、段数小于 2 或分段过短",
        ))
    }
}

impl CommandHandler for DivideStringerCommand {
    fn name(&self) -> &'static str {
        "divide_stringer"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        Self::run(request, context).unwrap_or_else(CommandResponse::from)
    }
}

/// `add_panel x1 y1 ... x4 y4 [width]`
struct AddPanelCommand;

impl AddPanelCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let mut panel = PanelObject::from_quad(quad(request)?);
        if request.args.len() >= 9 {
            panel = panel.with_width(Length(number(request, 8)?));
        }
        let applied = context.session.add_panel(panel);
        Ok(outcome(
            applied,
            format!("已添加面板，当前共 {} 块", context.session.model().panels().len()),
            "面板已存在或存在零长度边",
        ))
    }
}

impl CommandHandler for AddPanelCommand {
    fn name(&self) -> &'static str {
        "add_panel"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        Self::run(request, context).unwrap_or_else(CommandResponse::from)
    }
}

/// `divide_panel x1 y1 ... x4 y4 rows cols`
struct DividePanelCommand;

impl DividePanelCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let geometry = quad(request)?;
        let rows = count(request, 8)?;
        let cols = count(request, 9)?;
        Ok(outcome(
            context.session.divide_panel(&geometry, rows, cols),
            format!("面板已划分为 {rows} × {cols} 块"),
            "找不到面板、面板不是矩形或划分过细",
        ))
    }
}

impl CommandHandler for DividePanelCommand {
    fn name(&self) -> &'static str {
        "divide_panel"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        Self::run(request, context).unwrap_or_else(CommandResponse::from)
    }
}

/// `set_constraint x y free|x|y|xy`
struct SetConstraintCommand;

impl SetConstraintCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let position = point(request, 0)?;
        let value = constraint(request.args.get(2))?;
        context.session.change_constraint(position, value);
        Ok(CommandResponse::ok(format!(
            "节点 ({:.3}, {:.3}) 约束为 {:?}",
            position.x(),
            position.y(),
            context.session.model().constraints().value_at(position)
        )))
    }
}

impl CommandHandler for SetConstraintCommand {
    fn name(&self) -> &'static str {
        "set_constraint"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        Self::run(request, context).unwrap_or_else(CommandResponse::from)
    }
}

/// `set_force x y fx fy`，力以显示单位输入。
struct SetForceCommand;

impl SetForceCommand {
    fn run(
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandResponse, EngineError> {
        let position = point(request, 0)?;
        let unit = context.session.settings().units.force;
        let value = PlaneForce {
            x: unit.to_force(number(request, 2)?),
            y: unit.to_force(number(request, 3)?),
        };
        context.session.change_force(position, value);
        Ok(CommandResponse::ok(format!(
            "节点 ({:.3}, {:.3}) 的力分量数为 {}",
            position.x(),
            position.y(),
            context.session.model().forces().at(position).len()
        )))
    }
}

impl CommandHandler for SetForceCommand {
    fn name(&self) -> &'static str {
        "set_force"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        Self::run(request, context).unwrap_or_else(CommandResponse::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelSettings;

    fn session() -> Session<Document> {
        Session::new(Document::new(), ModelSettings::default())
    }

    #[test]
    fn stringer_commands_drive_the_session() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let add = CommandRequest::new("add_stringer", ["0", "0", "300", "0"]);
        assert!(bus.dispatch(&add, &mut context).success);
        let divide = CommandRequest::new("divide_stringer", ["300", "0", "0", "0", "3"]);
        assert!(bus.dispatch(&divide, &mut context).success);

        assert_eq!(context.session.model().stringers().len(), 3);
        assert_eq!(context.session.model().nodes().len(), 7);
    }

    #[test]
    fn force_command_converts_display_units() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };
        let request = CommandRequest::new("set_force", ["0", "0", "0", "-10"]);
        let response = bus.dispatch(&request, &mut context);
        assert!(response.success);
        let value = context
            .session
            .model()
            .forces()
            .value_at(Point2::new(0.0, 0.0));
        assert_eq!(value, PlaneForce::new(0.0, -10_000.0));
    }

    #[test]
    fn malformed_arguments_are_reported() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let response = bus.dispatch(
            &CommandRequest::new("set_constraint", ["0", "0", "z"]),
            &mut context,
        );
        assert!(!response.success);
        assert!(response.message.unwrap().contains("未知约束类型"));

        let response = bus.dispatch(
            &CommandRequest::new("add_stringer", ["0", "zero", "1", "0"]),
            &mut context,
        );
        assert!(!response.success);

        let response = bus.dispatch(
            &CommandRequest::new("explode", Vec::<String>::new()),
            &mut context,
        );
        assert!(!response.success);
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        for _ in 0..2 {
            let add = CommandRequest::new("add_stringer", ["NaN", "0", "1", "0"]);
            let response = bus.dispatch(&add, &mut context);
            assert!(!response.success);
            assert!(response.message.unwrap().contains("有限值"));
        }
        let force = CommandRequest::new("set_force", ["0", "inf", "1", "0"]);
        assert!(!bus.dispatch(&force, &mut context).success);

        assert!(context.session.model().stringers().is_empty());
        assert!(context.session.model().forces().is_empty());
        assert_eq!(context.session.host().entities().count(), 0);
    }

    #[test]
    fn huge_divide_counts_are_rejected() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };
        let add = CommandRequest::new("add_stringer", ["0", "0", "300", "0"]);
        assert!(bus.dispatch(&add, &mut context).success);

        let divide = CommandRequest::new(
            "divide_stringer",
            ["0", "0", "300", "0", "1000000000000"],
        );
        assert!(!bus.dispatch(&divide, &mut context).success);
        assert_eq!(context.session.model().stringers().len(), 1);
    }
}
