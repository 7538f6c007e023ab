use std::env;
use std::path::{Path, PathBuf};

use spm_config::AppConfig;
use spm_core::document::Document;
use spm_engine::command::{CommandBus, CommandContext, CommandRequest};
use spm_engine::model::ModelSettings;
use spm_engine::session::Session;
use spm_io::{DocumentLoader, JsonFacade};
use tracing::{info, warn};

/// 环境变量：指定启动时载入的 JSON 图纸。
pub const SAMPLE_DRAWING_ENV: &str = "SPM_SAMPLE_DRAWING";

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    Json(PathBuf),
    Demo,
}

/// 加载后的会话与来源。
#[derive(Debug)]
pub struct LoadedSession {
    pub session: Session<Document>,
    pub source: DocumentSource,
}

/// 由配置得到模型设置。
pub fn model_settings(config: &AppConfig) -> ModelSettings {
    ModelSettings {
        tolerance: config.model.tolerance,
        units: config.units,
    }
}

/// 按优先级选择图纸：显式路径、环境变量 `SPM_SAMPLE_DRAWING`、配置项 `frontend.sample_drawing`。
/// 都没有或加载失败时回退到内置示例模型。
pub fn load_session(config: &AppConfig, drawing: Option<&Path>) -> LoadedSession {
    let settings = model_settings(config);
    let path = drawing
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(SAMPLE_DRAWING_ENV).map(PathBuf::from))
        .or_else(|| config.frontend.sample_drawing.clone());

    if let Some(path) = path {
        match JsonFacade::new().load(&path) {
            Ok(document) => {
                info!(path = %path.display(), "从 JSON 加载图纸成功");
                return LoadedSession {
                    session: Session::load(document, settings),
                    source: DocumentSource::Json(path),
                };
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载图纸失败，回退到内置示例");
            }
        }
    }

    let mut session = Session::new(Document::new(), settings);
    populate_demo(&mut session);
    LoadedSession {
        session,
        source: DocumentSource::Demo,
    }
}

/// 两跨剪力墙示例：六根边缘桁条、一根中间桁条、两块面板、左侧支座与右上角荷载。
const DEMO_COMMANDS: &[(&str, &[&str])] = &[
    ("add_stringer", &["0", "0", "400", "0"]),
    ("add_stringer", &["400", "0", "800", "0"]),
    ("add_stringer", &["0", "200", "400", "200"]),
    ("add_stringer", &["400", "200", "800", "200"]),
    ("add_stringer", &["0", "0", "0", "200"]),
    ("add_stringer", &["400", "0", "400", "200"]),
    ("add_stringer", &["800", "0", "800", "200"]),
    (
        "add_panel",
        &["0", "0", "400", "0", "400", "200", "0", "200"],
    ),
    (
        "add_panel",
        &["400", "0", "800", "0", "800", "200", "400", "200"],
    ),
    ("set_constraint", &["0", "0", "xy"]),
    ("set_constraint", &["0", "200", "x"]),
    ("set_force", &["800", "200", "0", "-10"]),
];

fn populate_demo(session: &mut Session<Document>) {
    let bus = CommandBus::new();
    let mut context = CommandContext { session };
    for (name, args) in DEMO_COMMANDS {
        let request = CommandRequest::new(*name, args.iter().copied());
        let response = bus.dispatch(&request, &mut context);
        if !response.success {
            warn!(command = *name, message = ?response.message, "示例命令执行失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spm_core::geometry::Point2;
    use spm_core::units::ForceUnit;
    use spm_engine::conditions::{Constraint, PlaneForce};
    use spm_io::DocumentSaver;

    #[test]
    fn demo_model_is_built_from_commands() {
        let mut session = Session::new(Document::new(), ModelSettings::default());
        populate_demo(&mut session);
        let model = session.model();
        assert_eq!(model.stringers().len(), 7);
        assert_eq!(model.panels().len(), 2);
        assert_eq!(
            model.constraints().value_at(Point2::new(0.0, 0.0)),
            Constraint::Fixed
        );
        assert_eq!(
            model.forces().value_at(Point2::new(800.0, 200.0)),
            PlaneForce::new(0.0, -10_000.0)
        );
    }

    #[test]
    fn explicit_drawing_takes_precedence() {
        let mut source = Session::new(Document::new(), ModelSettings::default());
        populate_demo(&mut source);
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("frame.json");
        JsonFacade::new()
            .save(source.host(), &path)
            .expect("save drawing");

        let loaded = load_session(&AppConfig::default(), Some(&path));
        assert_eq!(loaded.source, DocumentSource::Json(path));
        assert_eq!(loaded.session.elements(), source.elements());
    }

    #[test]
    fn missing_drawing_falls_back_to_demo() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.json");
        let loaded = load_session(&AppConfig::default(), Some(&path));
        assert_eq!(loaded.source, DocumentSource::Demo);
        assert_eq!(loaded.session.model().panels().len(), 2);
    }

    #[test]
    fn settings_follow_configuration() {
        let mut config = AppConfig::default();
        config.model.tolerance = 0.5;
        config.units.force = ForceUnit::Newton;
        let settings = model_settings(&config);
        assert_eq!(settings.tolerance, 0.5);
        assert_eq!(settings.units.force, ForceUnit::Newton);
    }
}
