use std::convert::Infallible;
use std::sync::Arc;

use serde::Serialize;
use warp::Filter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

use crate::match_controller::MatchController;
use crate::session::{SessionError, SessionService};
use duel_types::{
    ConnectionRequest, CreateMatchResponse, ErrorResponse, GuessRequest, JoinMatchResponse,
    MatchError, MatchId, PlayerRole, SessionIdentity,
};

pub mod config;
pub mod idle_sweep;
pub mod match_controller;
pub mod match_locks;
pub mod session;

const MAX_BODY_BYTES: u64 = 4 * 1024;
const RETRY_AFTER_SECS: &str = "1";

pub fn create_routes(
    controller: MatchController,
    sessions: Arc<SessionService>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let controller_filter = warp::any().map({
        let controller = controller.clone();
        move || controller.clone()
    });

    let session_filter = warp::any().map({
        let sessions = sessions.clone();
        move || sessions.clone()
    });

    let auth_header = warp::header::optional::<String>("authorization");

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let create_match = warp::path!("matches")
        .and(warp::post())
        .and(controller_filter.clone())
        .and(session_filter.clone())
        .and_then(handle_create_match);

    let join_match = warp::path!("matches" / MatchId / "join")
        .and(warp::post())
        .and(controller_filter.clone())
        .and(session_filter.clone())
        .and_then(handle_join_match);

    let start_match = warp::path!("matches" / MatchId / "start")
        .and(warp::post())
        .and(auth_header.clone())
        .and(controller_filter.clone())
        .and(session_filter.clone())
        .and_then(handle_start_match);

    let submit_guess = warp::path!("matches" / MatchId / "guesses")
        .and(warp::post())
        .and(auth_header.clone())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<GuessRequest>())
        .and(controller_filter.clone())
        .and(session_filter.clone())
        .and_then(handle_submit_guess);

    let set_connection = warp::path!("matches" / MatchId / "connection")
        .and(warp::post())
        .and(auth_header.clone())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<ConnectionRequest>())
        .and(controller_filter.clone())
        .and(session_filter.clone())
        .and_then(handle_set_connection);

    let resign = warp::path!("matches" / MatchId / "resign")
        .and(warp::post())
        .and(auth_header.clone())
        .and(controller_filter.clone())
        .and(session_filter.clone())
        .and_then(handle_resign);

    let match_view = warp::path!("matches" / MatchId)
        .and(warp::get())
        .and(auth_header.clone())
        .and(controller_filter.clone())
        .and(session_filter.clone())
        .and_then(handle_match_view);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST"]);

    health
        .or(create_match)
        .or(join_match)
        .or(start_match)
        .or(submit_guess)
        .or(set_connection)
        .or(resign)
        .or(match_view)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::log("word_duel"))
}

/// HTTP status for each failure kind.
pub fn status_for(err: &MatchError) -> StatusCode {
    match err {
        MatchError::NotFound { .. } => StatusCode::NOT_FOUND,
        MatchError::PlayerNotInMatch { .. } => StatusCode::FORBIDDEN,
        MatchError::InvalidGuessFormat { .. } => StatusCode::BAD_REQUEST,
        MatchError::InvalidTransition { .. }
        | MatchError::MatchNotWaiting { .. }
        | MatchError::NotReady
        | MatchError::MatchFull
        | MatchError::AlreadyFinished => StatusCode::CONFLICT,
        MatchError::GuessLimitExceeded | MatchError::ClockExhausted => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        MatchError::Transient { .. } => StatusCode::SERVICE_UNAVAILABLE,
        MatchError::StorageFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_reply(kind: &str, message: impl Into<String>, status: StatusCode) -> Response {
    let body = ErrorResponse {
        kind: kind.to_string(),
        message: message.into(),
    };
    json_reply(&body, status)
}

fn match_error_reply(err: &MatchError) -> Response {
    let status = status_for(err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Request failed: {}", err);
    }
    let reply = json_reply(&ErrorResponse::from(err), status);
    if err.is_retryable() {
        warp::reply::with_header(reply, "retry-after", RETRY_AFTER_SECS).into_response()
    } else {
        reply
    }
}

fn session_error_reply(err: &SessionError) -> Response {
    match err {
        SessionError::Signing => error_reply("SessionFailure", err.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
        _ => error_reply("Unauthorized", err.to_string(), StatusCode::UNAUTHORIZED),
    }
}

/// Verify the bearer token and check it was issued for this match.
fn authorize(
    sessions: &SessionService,
    auth_header: Option<String>,
    match_id: MatchId,
) -> Result<SessionIdentity, Response> {
    let Some(header) = auth_header else {
        return Err(error_reply(
            "Unauthorized",
            "Authentication required",
            StatusCode::UNAUTHORIZED,
        ));
    };

    let identity = sessions
        .verify_header(&header)
        .map_err(|e| session_error_reply(&e))?;

    if identity.match_id != match_id {
        return Err(error_reply(
            "Forbidden",
            "Token was issued for a different match",
            StatusCode::FORBIDDEN,
        ));
    }
    Ok(identity)
}

async fn handle_create_match(
    controller: MatchController,
    sessions: Arc<SessionService>,
) -> Result<Response, warp::Rejection> {
    let (match_id, player_id) = match controller.create_match().await {
        Ok(created) => created,
        Err(err) => return Ok(match_error_reply(&err)),
    };

    let reply = match sessions.issue(match_id, player_id, PlayerRole::Host) {
        Ok(token) => json_reply(
            &CreateMatchResponse {
                match_id,
                player_id,
                token,
            },
            StatusCode::CREATED,
        ),
        Err(err) => session_error_reply(&err),
    };
    Ok(reply)
}

async fn handle_join_match(
    match_id: MatchId,
    controller: MatchController,
    sessions: Arc<SessionService>,
) -> Result<Response, warp::Rejection> {
    let player_id = match controller.join_match(match_id).await {
        Ok(player_id) => player_id,
        Err(err) => return Ok(match_error_reply(&err)),
    };

    let reply = match sessions.issue(match_id, player_id, PlayerRole::Guest) {
        Ok(token) => json_reply(
            &JoinMatchResponse {
                match_id,
                player_id,
                token,
            },
            StatusCode::OK,
        ),
        Err(err) => session_error_reply(&err),
    };
    Ok(reply)
}

async fn handle_start_match(
    match_id: MatchId,
    auth_header: Option<String>,
    controller: MatchController,
    sessions: Arc<SessionService>,
) -> Result<Response, warp::Rejection> {
    let identity = match authorize(&sessions, auth_header, match_id) {
        Ok(identity) => identity,
        Err(reply) => return Ok(reply),
    };

    if identity.role != PlayerRole::Host {
        return Ok(error_reply(
            "Forbidden",
            "Only the host can start the match",
            StatusCode::FORBIDDEN,
        ));
    }

    let reply = match controller.start_match(match_id).await {
        Ok(()) => match controller.get_match_view(match_id, identity.player_id).await {
            Ok(view) => json_reply(&view, StatusCode::OK),
            Err(err) => match_error_reply(&err),
        },
        Err(err) => match_error_reply(&err),
    };
    Ok(reply)
}

async fn handle_submit_guess(
    match_id: MatchId,
    auth_header: Option<String>,
    request: GuessRequest,
    controller: MatchController,
    sessions: Arc<SessionService>,
) -> Result<Response, warp::Rejection> {
    let identity = match authorize(&sessions, auth_header, match_id) {
        Ok(identity) => identity,
        Err(reply) => return Ok(reply),
    };

    let reply = match controller
        .submit_guess(match_id, identity.player_id, &request.word)
        .await
    {
        Ok(receipt) => json_reply(&receipt, StatusCode::OK),
        Err(err) => match_error_reply(&err),
    };
    Ok(reply)
}

async fn handle_set_connection(
    match_id: MatchId,
    auth_header: Option<String>,
    request: ConnectionRequest,
    controller: MatchController,
    sessions: Arc<SessionService>,
) -> Result<Response, warp::Rejection> {
    let identity = match authorize(&sessions, auth_header, match_id) {
        Ok(identity) => identity,
        Err(reply) => return Ok(reply),
    };

    let reply = match controller
        .set_connection(match_id, identity.player_id, request.connected)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => match_error_reply(&err),
    };
    Ok(reply)
}

async fn handle_resign(
    match_id: MatchId,
    auth_header: Option<String>,
    controller: MatchController,
    sessions: Arc<SessionService>,
) -> Result<Response, warp::Rejection> {
    let identity = match authorize(&sessions, auth_header, match_id) {
        Ok(identity) => identity,
        Err(reply) => return Ok(reply),
    };

    let reply = match controller.resign(match_id, identity.player_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => match_error_reply(&err),
    };
    Ok(reply)
}

async fn handle_match_view(
    match_id: MatchId,
    auth_header: Option<String>,
    controller: MatchController,
    sessions: Arc<SessionService>,
) -> Result<Response, warp::Rejection> {
    let identity = match authorize(&sessions, auth_header, match_id) {
        Ok(identity) => identity,
        Err(reply) => return Ok(reply),
    };

    let reply = match controller
        .get_match_view(match_id, identity.player_id)
        .await
    {
        Ok(view) => json_reply(&view, StatusCode::OK),
        Err(err) => match_error_reply(&err),
    };
    Ok(reply)
}

async fn handle_rejection(rejection: warp::Rejection) -> Result<Response, Infallible> {
    let reply = if rejection.is_not_found() {
        error_reply("NotFound", "No such route", StatusCode::NOT_FOUND)
    } else if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        error_reply("BadRequest", err.to_string(), StatusCode::BAD_REQUEST)
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_reply("PayloadTooLarge", "Request body too large", StatusCode::PAYLOAD_TOO_LARGE)
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply("MethodNotAllowed", "Method not allowed", StatusCode::METHOD_NOT_ALLOWED)
    } else {
        tracing::warn!("Unhandled rejection: {:?}", rejection);
        error_reply("BadRequest", "Bad request", StatusCode::BAD_REQUEST)
    };
    Ok(reply)
}
