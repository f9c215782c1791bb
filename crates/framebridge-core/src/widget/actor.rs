use super::WidgetCore;

/// A model placed in a `ModelScene`.
#[derive(Debug, Clone)]
pub struct ModelSceneActor {
    pub core: WidgetCore,
    pub model_path: Option<String>,
    pub file_id: Option<i64>,
    pub position: [f64; 3],
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub scale: f64,
}

impl ModelSceneActor {
    pub fn new(core: WidgetCore) -> Self {
        Self {
            core,
            model_path: None,
            file_id: None,
            position: [0.0; 3],
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            scale: 1.0,
        }
    }
}
