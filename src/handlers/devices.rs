use axum::{
    Extension,
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    error::Result,
    middleware_layer::auth::AuthUser,
    models::wire::{
        CreateDeviceRequest, DeviceAck, DeviceRecord, DeviceResponse, LinkDeviceRequest,
        PublicContact, PublicContactsResponse, UpdateContactsRequest, UpdateContactsResponse,
        UpdateTriggerWordsRequest, UpdateTriggerWordsResponse,
    },
    services::devices as device_service,
    state::AppState,
    validation::{sessions as session_validation, settings as settings_validation},
};

/// Registers a device. Fleet provisioning, guarded by the API key.
#[axum::debug_handler]
pub async fn create_device(
    State(state): State<AppState>,
    Json(req): Json<CreateDeviceRequest>,
) -> Result<Response> {
    session_validation::validate_device_id(&req.device_id)?;

    let device = device_service::register_device(&state, req.device_id.trim()).await?;

    let response = sonic_rs::to_string(&DeviceAck {
        success: true,
        message: "Device created successfully".to_string(),
        device_id: device.device_id,
    })
    .unwrap();

    Ok((StatusCode::CREATED, response).into_response())
}

/// Links a device to the requesting user.
#[axum::debug_handler]
pub async fn link_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<LinkDeviceRequest>,
) -> Result<Response> {
    session_validation::validate_device_id(&req.device_id)?;

    let device = device_service::link_device(&state, req.device_id.trim(), user.user_id).await?;

    let response = sonic_rs::to_string(&DeviceAck {
        success: true,
        message: "Device linked successfully".to_string(),
        device_id: device.device_id,
    })
    .unwrap();

    Ok((StatusCode::OK, response).into_response())
}

/// Reads the device record, including its current location when triggered.
#[axum::debug_handler]
pub async fn get_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<String>,
) -> Result<Response> {
    let (device, current_location) =
        device_service::device_info(&state, &device_id, user.user_id).await?;

    let body = DeviceResponse {
        success: true,
        device: DeviceRecord {
            device_id: device.device_id,
            emergency_contacts: device.emergency_contacts,
            trigger_words: device.trigger_words,
            is_triggered: device.is_triggered,
            last_active: device.last_active,
            current_location,
        },
    };

    Ok((StatusCode::OK, sonic_rs::to_string(&body).unwrap()).into_response())
}

/// Replaces the device's emergency contacts.
#[axum::debug_handler]
pub async fn update_emergency_contacts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<String>,
    Json(req): Json<UpdateContactsRequest>,
) -> Result<Response> {
    settings_validation::validate_emergency_contacts(&req.emergency_contacts)?;

    let contacts = device_service::update_emergency_contacts(
        &state,
        &device_id,
        user.user_id,
        req.emergency_contacts,
    )
    .await?;

    let response = sonic_rs::to_string(&UpdateContactsResponse {
        success: true,
        message: "Emergency contacts updated successfully".to_string(),
        emergency_contacts: contacts,
    })
    .unwrap();

    Ok((StatusCode::OK, response).into_response())
}

/// Replaces the device's trigger words.
#[axum::debug_handler]
pub async fn update_trigger_words(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<String>,
    Json(req): Json<UpdateTriggerWordsRequest>,
) -> Result<Response> {
    settings_validation::validate_trigger_words(&req.trigger_words)?;

    let words = device_service::update_trigger_words(
        &state,
        &device_id,
        user.user_id,
        req.trigger_words,
    )
    .await?;

    let response = sonic_rs::to_string(&UpdateTriggerWordsResponse {
        success: true,
        message: "Trigger words updated successfully".to_string(),
        trigger_words: words,
    })
    .unwrap();

    Ok((StatusCode::OK, response).into_response())
}

/// Phone numbers only, consumed by the device during an emergency.
#[axum::debug_handler]
pub async fn public_emergency_contacts(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Response> {
    let phones = device_service::public_emergency_contacts(&state, &device_id).await?;

    let body = PublicContactsResponse {
        success: true,
        emergency_contacts: phones.into_iter().map(|phone| PublicContact { phone }).collect(),
    };

    Ok((StatusCode::OK, sonic_rs::to_string(&body).unwrap()).into_response())
}
