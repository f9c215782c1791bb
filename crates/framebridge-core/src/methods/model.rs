//! `Model`, `PlayerModel`, `ModelScene` and `ModelSceneActor`.

use super::{LuaResult, MethodCtx};
use crate::bridge::CreateRequest;
use crate::class::NativeMethod;
use crate::widget::{self, FrameExtra, ModelSceneActor, ModelSceneState, ModelState, WidgetKind};
use mlua::MultiValue;

pub const MODEL_METHODS: &[(&str, NativeMethod)] = &[
    ("SetModel", set_model),
    ("GetModelFileID", get_model_file_id),
    ("ClearModel", clear_model),
    ("SetFacing", set_facing),
    ("GetFacing", get_facing),
    ("SetPosition", set_position),
    ("GetPosition", get_position),
    ("SetCamDistanceScale", set_cam_distance_scale),
    ("GetCamDistanceScale", get_cam_distance_scale),
];

pub const PLAYER_MODEL_METHODS: &[(&str, NativeMethod)] = &[
    ("SetUnit", set_unit),
    ("GetUnit", get_unit),
    ("SetDisplayInfo", set_display_info),
    ("GetDisplayInfo", get_display_info),
];

pub const MODEL_SCENE_METHODS: &[(&str, NativeMethod)] = &[
    ("CreateActor", create_actor),
    ("GetNumActors", get_num_actors),
    ("GetActorAtIndex", get_actor_at_index),
    ("SetCameraPosition", set_camera_position),
    ("GetCameraPosition", get_camera_position),
    ("SetCameraFieldOfView", set_camera_field_of_view),
    ("GetCameraFieldOfView", get_camera_field_of_view),
];

pub const ACTOR_METHODS: &[(&str, NativeMethod)] = &[
    ("SetModelByFileID", actor_set_model_by_file_id),
    ("SetModelByPath", actor_set_model_by_path),
    ("GetModelFileID", actor_get_model_file_id),
    ("GetModelPath", actor_get_model_path),
    ("ClearModel", actor_clear_model),
    ("SetPosition", actor_set_position),
    ("GetPosition", actor_get_position),
    ("SetYaw", actor_set_yaw),
    ("GetYaw", actor_get_yaw),
    ("SetPitch", actor_set_pitch),
    ("GetPitch", actor_get_pitch),
    ("SetRoll", actor_set_roll),
    ("GetRoll", actor_get_roll),
    ("SetScale", actor_set_scale),
    ("GetScale", actor_get_scale),
    ("SetAlpha", actor_set_alpha),
    ("GetAlpha", actor_get_alpha),
    ("Show", actor_show),
    ("Hide", actor_hide),
    ("SetShown", actor_set_shown),
    ("IsShown", actor_is_shown),
];

fn with_model<R>(ctx: &MethodCtx<'_, '_>, f: impl FnOnce(&mut ModelState) -> R) -> LuaResult<R> {
    ctx.with_frame(|frame| match &mut frame.extra {
        FrameExtra::Model(state) => Some(f(state)),
        _ => None,
    })?
    .ok_or_else(|| ctx.wrong_type())
}

fn with_scene<R>(ctx: &MethodCtx<'_, '_>, f: impl FnOnce(&mut ModelSceneState) -> R) -> LuaResult<R> {
    ctx.with_frame(|frame| match &mut frame.extra {
        FrameExtra::ModelScene(state) => Some(f(state)),
        _ => None,
    })?
    .ok_or_else(|| ctx.wrong_type())
}

fn with_actor<R>(ctx: &MethodCtx<'_, '_>, f: impl FnOnce(&mut ModelSceneActor) -> R) -> LuaResult<R> {
    let actor = ctx.actor()?;
    let mut guard = widget::lock(&actor);
    Ok(f(&mut guard))
}

fn vector(ctx: &MethodCtx<'_, '_>, first: usize) -> LuaResult<[f64; 3]> {
    Ok([
        ctx.number(first)?,
        ctx.number(first + 1)?,
        ctx.number(first + 2)?,
    ])
}

/// A model given as a file id or an asset path.
enum ModelSource {
    FileId(i64),
    Path(String),
}

fn model_source(ctx: &MethodCtx<'_, '_>, idx: usize) -> LuaResult<ModelSource> {
    match ctx.value(idx) {
        mlua::Value::Integer(_) | mlua::Value::Number(_) => Ok(ModelSource::FileId(ctx.integer(idx)?)),
        _ => Ok(ModelSource::Path(ctx.string(idx)?)),
    }
}

// ── Model ─────────────────────────────────────────────────────

fn set_model<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let source = model_source(&ctx, 0)?;
    with_model(&ctx, |model| {
        model.clear();
        match source {
            ModelSource::FileId(id) => model.file_id = Some(id),
            ModelSource::Path(path) => model.model = Some(path),
        }
    })?;
    ctx.none()
}

fn get_model_file_id<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_model(&ctx, |model| model.file_id)?)
}

fn clear_model<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    with_model(&ctx, ModelState::clear)?;
    ctx.none()
}

fn set_facing<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let facing = ctx.number(0)?.rem_euclid(std::f64::consts::TAU);
    with_model(&ctx, |model| model.facing = facing)?;
    ctx.none()
}

fn get_facing<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_model(&ctx, |model| model.facing)?)
}

fn set_position<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let position = vector(&ctx, 0)?;
    with_model(&ctx, |model| model.position = position)?;
    ctx.none()
}

fn get_position<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let [x, y, z] = with_model(&ctx, |model| model.position)?;
    ctx.ret((x, y, z))
}

fn set_cam_distance_scale<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let scale = ctx.number(0)?;
    if scale <= 0.0 {
        return Err(ctx.bad_argument(0, "scale must be positive"));
    }
    with_model(&ctx, |model| model.cam_distance_scale = scale)?;
    ctx.none()
}

fn get_cam_distance_scale<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_model(&ctx, |model| model.cam_distance_scale)?)
}

// ── PlayerModel ───────────────────────────────────────────────

fn set_unit<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let unit = ctx.string(0)?;
    with_model(&ctx, |model| {
        model.clear();
        model.unit = Some(unit);
    })?;
    ctx.none()
}

fn get_unit<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_model(&ctx, |model| model.unit.clone())?)
}

fn set_display_info<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let display_id = ctx.integer(0)?;
    with_model(&ctx, |model| {
        model.clear();
        model.display_id = Some(display_id);
    })?;
    ctx.none()
}

fn get_display_info<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_model(&ctx, |model| model.display_id)?)
}

// ── ModelScene ────────────────────────────────────────────────

/// `CreateActor([name [, template]])`
fn create_actor<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let mut request = CreateRequest::new(WidgetKind::ModelSceneActor).parent(ctx.this);
    if let Some(name) = ctx.opt_string(0)? {
        request = request.named(name);
    }
    if let Some(template) = ctx.opt_string(1)? {
        request = request.template(template);
    }
    let (_, wrapper) = ctx.bridge.create_object(ctx.lua, request)?;
    ctx.ret(wrapper)
}

fn get_num_actors<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_scene(&ctx, |scene| scene.actors.len())?)
}

fn get_actor_at_index<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let position = ctx.position(0)?;
    let actor = with_scene(&ctx, |scene| position.and_then(|idx| scene.actors.get(idx).copied()))?;
    ctx.ret_object(actor)
}

fn set_camera_position<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let position = vector(&ctx, 0)?;
    with_scene(&ctx, |scene| scene.camera_position = position)?;
    ctx.none()
}

fn get_camera_position<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let [x, y, z] = with_scene(&ctx, |scene| scene.camera_position)?;
    ctx.ret((x, y, z))
}

fn set_camera_field_of_view<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let fov = ctx.number(0)?;
    if !(fov > 0.0 && fov < std::f64::consts::PI) {
        return Err(ctx.bad_argument(0, "field of view must be between 0 and pi"));
    }
    with_scene(&ctx, |scene| scene.field_of_view = fov)?;
    ctx.none()
}

fn get_camera_field_of_view<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_scene(&ctx, |scene| scene.field_of_view)?)
}

// ── ModelSceneActor ───────────────────────────────────────────

fn actor_set_model_by_file_id<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let id = ctx.integer(0)?;
    with_actor(&ctx, |actor| {
        actor.file_id = Some(id);
        actor.model_path = None;
    })?;
    ctx.ret(true)
}

fn actor_set_model_by_path<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let path = ctx.string(0)?;
    with_actor(&ctx, |actor| {
        actor.model_path = Some(path);
        actor.file_id = None;
    })?;
    ctx.ret(true)
}

fn actor_get_model_file_id<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_actor(&ctx, |actor| actor.file_id)?)
}

fn actor_get_model_path<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_actor(&ctx, |actor| actor.model_path.clone())?)
}

fn actor_clear_model<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    with_actor(&ctx, |actor| {
        actor.model_path = None;
        actor.file_id = None;
    })?;
    ctx.none()
}

fn actor_set_position<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let position = vector(&ctx, 0)?;
    with_actor(&ctx, |actor| actor.position = position)?;
    ctx.none()
}

fn actor_get_position<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let [x, y, z] = with_actor(&ctx, |actor| actor.position)?;
    ctx.ret((x, y, z))
}

fn actor_set_yaw<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let yaw = ctx.number(0)?;
    with_actor(&ctx, |actor| actor.yaw = yaw)?;
    ctx.none()
}

fn actor_get_yaw<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_actor(&ctx, |actor| actor.yaw)?)
}

fn actor_set_pitch<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let pitch = ctx.number(0)?;
    with_actor(&ctx, |actor| actor.pitch = pitch)?;
    ctx.none()
}

fn actor_get_pitch<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_actor(&ctx, |actor| actor.pitch)?)
}

fn actor_set_roll<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let roll = ctx.number(0)?;
    with_actor(&ctx, |actor| actor.roll = roll)?;
    ctx.none()
}

fn actor_get_roll<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_actor(&ctx, |actor| actor.roll)?)
}

fn actor_set_scale<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let scale = ctx.number(0)?;
    if scale <= 0.0 {
        return Err(ctx.bad_argument(0, "scale must be positive"));
    }
    with_actor(&ctx, |actor| actor.scale = scale)?;
    ctx.none()
}

fn actor_get_scale<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(with_actor(&ctx, |actor| actor.scale)?)
}

fn actor_set_alpha<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let alpha = ctx.number(0)?.clamp(0.0, 1.0);
    ctx.with_core(|core| core.alpha = alpha)?;
    ctx.none()
}

fn actor_get_alpha<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.with_core(|core| core.alpha)?)
}

fn actor_show<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.with_core(|core| core.shown = true)?;
    ctx.none()
}

fn actor_hide<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.with_core(|core| core.shown = false)?;
    ctx.none()
}

fn actor_set_shown<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    let shown = ctx.truthy(0);
    ctx.with_core(|core| core.shown = shown)?;
    ctx.none()
}

fn actor_is_shown<'lua>(ctx: MethodCtx<'lua, '_>) -> LuaResult<MultiValue<'lua>> {
    ctx.ret(ctx.with_core(|core| core.shown)?)
}
