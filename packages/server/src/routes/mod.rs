use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/events", event_routes())
        .nest("/dlq", dlq_routes())
        .nest("/replay", replay_routes())
}

fn event_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::events::publish_event,
            handlers::events::list_events
        ))
        .routes(routes!(
            handlers::events::get_event,
            handlers::events::correct_event
        ))
        .routes(routes!(handlers::events::get_event_status))
}

fn dlq_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::dlq::list_dlq_entries))
        .routes(routes!(handlers::dlq::get_dlq_stats))
        .routes(routes!(handlers::dlq::get_dlq_entry))
        .routes(routes!(handlers::dlq::retry_dlq_entry))
        .routes(routes!(handlers::dlq::archive_dlq_entry))
}

fn replay_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/sessions", replay_session_routes())
        .routes(routes!(handlers::replay::list_replay_events))
}

fn replay_session_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::replay::create_replay_session,
            handlers::replay::list_replay_sessions
        ))
        .routes(routes!(handlers::replay::get_replay_session))
        .routes(routes!(handlers::replay::get_replay_progress))
        .routes(routes!(handlers::replay::start_replay_session))
        .routes(routes!(handlers::replay::pause_replay_session))
        .routes(routes!(handlers::replay::resume_replay_session))
        .routes(routes!(handlers::replay::cancel_replay_session))
}
