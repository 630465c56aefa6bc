//! Integration tests for the persona workflow
//!
//! Tests cover:
//! - Verification and confirmation with photo evidence, and their reversals
//! - Novedades blocking progress and returning personas to DATOS_PENDIENTES
//! - Evidence validation (content type, size limit)
//! - Historial and estado-change events

mod common;

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use votrack_common::db::settings::{set_setting, EVIDENCE_MAX_BYTES};
use votrack_common::events::VotrackEvent;
use votrack_common::{Action, Estado};

use common::{body_bytes, setup, TestApp};

const PHOTO: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

fn photo_body(content_type: &str) -> serde_json::Value {
    json!({
        "photo_base64": STANDARD.encode(PHOTO),
        "content_type": content_type,
        "note": "mesa 7",
    })
}

fn evidence_files(app: &TestApp) -> usize {
    match std::fs::read_dir(app.evidence_dir()) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

#[tokio::test]
async fn test_full_workflow_with_reversals() {
    let app = setup().await;
    let w = app.world().await;
    let id = app.persona(&w.lider1, "800001", None).await;

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/personas/{}/verificar", id),
            Some(&w.validador.token),
            Some(json!({"note": "llamada ok"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["estado"], "VERIFICADO");

    let (status, confirmacion) = app
        .call(
            "POST",
            &format!("/api/personas/{}/confirmar", id),
            Some(&w.confirmador.token),
            Some(photo_body("image/png")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", confirmacion);
    assert_eq!(confirmacion["size_bytes"], PHOTO.len());
    assert_eq!(confirmacion["content_type"], "image/png");
    assert!(confirmacion.get("evidence_key").is_none());
    assert_eq!(app.estado_of(&w.lider1, &id).await, "CONFIRMADO");
    assert_eq!(evidence_files(&app), 1);

    // The owning líder can see the evidence
    let foto_uri = format!(
        "/api/confirmaciones/{}/foto",
        confirmacion["id"].as_str().unwrap()
    );
    let response = app.send("GET", &foto_uri, Some(&w.lider1.token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(body_bytes(response).await, PHOTO);

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/personas/{}/revertir-confirmacion", id),
            Some(&w.confirmador.token),
            Some(json!({"reason": "foto equivocada"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.estado_of(&w.admin, &id).await, "VERIFICADO");

    let (_, list) = app
        .call(
            "GET",
            &format!("/api/personas/{}/confirmaciones", id),
            Some(&w.admin.token),
            None,
        )
        .await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["revert_reason"], "foto equivocada");
    assert!(list[0]["reverted_at"].is_string());

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/personas/{}/revertir-verificacion", id),
            Some(&w.validador.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["estado"], "DATOS_PENDIENTES");

    let (_, historial) = app
        .call(
            "GET",
            &format!("/api/personas/{}/historial", id),
            Some(&w.lider1.token),
            None,
        )
        .await;
    let actions: Vec<&str> = historial
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["action"].as_str().unwrap())
        .collect();
    assert_eq!(
        actions,
        [
            "VERIFICAR",
            "CONFIRMAR",
            "REVERTIR_CONFIRMACION",
            "REVERTIR_VERIFICACION"
        ]
    );
    assert_eq!(historial[0]["note"], "llamada ok");
    assert_eq!(historial[0]["user_id"], w.validador.id.to_string());
}

#[tokio::test]
async fn test_reconfirm_after_revert() {
    let app = setup().await;
    let w = app.world().await;
    let id = app.persona(&w.lider1, "800002", None).await;

    app.call("POST", &format!("/api/personas/{}/verificar", id), Some(&w.admin.token), None)
        .await;
    for _ in 0..2 {
        let (status, body) = app
            .call(
                "POST",
                &format!("/api/personas/{}/confirmar", id),
                Some(&w.confirmador.token),
                Some(photo_body("image/jpeg")),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let (status, _) = app
            .call(
                "POST",
                &format!("/api/personas/{}/revertir-confirmacion", id),
                Some(&w.confirmador.token),
                Some(json!({"reason": "repetir"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, list) = app
        .call(
            "GET",
            &format!("/api/personas/{}/confirmaciones", id),
            Some(&w.admin.token),
            None,
        )
        .await;
    assert_eq!(list.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_delete_of_confirmed_persona_removes_evidence() {
    let app = setup().await;
    let w = app.world().await;
    let id = app.persona(&w.lider1, "800003", None).await;

    app.call("POST", &format!("/api/personas/{}/verificar", id), Some(&w.admin.token), None)
        .await;
    // A reverted confirmation keeps its photo until the persona goes
    for reason in [Some("repetir"), None] {
        let (status, body) = app
            .call(
                "POST",
                &format!("/api/personas/{}/confirmar", id),
                Some(&w.confirmador.token),
                Some(photo_body("image/png")),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        if let Some(reason) = reason {
            app.call(
                "POST",
                &format!("/api/personas/{}/revertir-confirmacion", id),
                Some(&w.confirmador.token),
                Some(json!({"reason": reason})),
            )
            .await;
        }
    }
    assert_eq!(app.estado_of(&w.admin, &id).await, "CONFIRMADO");
    assert_eq!(evidence_files(&app), 2);

    let (status, _) = app
        .call("DELETE", &format!("/api/personas/{}", id), Some(&w.admin.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(evidence_files(&app), 0);

    let (status, _) = app
        .call("GET", &format!("/api/personas/{}", id), Some(&w.admin.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_confirm_requires_verification() {
    let app = setup().await;
    let w = app.world().await;
    let id = app.persona(&w.lider1, "800003", None).await;

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/personas/{}/confirmar", id),
            Some(&w.confirmador.token),
            Some(photo_body("image/png")),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(app.estado_of(&w.admin, &id).await, "DATOS_PENDIENTES");
    assert_eq!(evidence_files(&app), 0);
}

#[tokio::test]
async fn test_revert_without_confirmation_conflicts() {
    let app = setup().await;
    let w = app.world().await;
    let id = app.persona(&w.lider1, "800004", None).await;
    app.call("POST", &format!("/api/personas/{}/verificar", id), Some(&w.validador.token), None)
        .await;

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/personas/{}/revertir-confirmacion", id),
            Some(&w.confirmador.token),
            Some(json!({"reason": "x"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call("POST", &format!("/api/personas/{}/verificar", id), Some(&w.validador.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_evidence_validation() {
    let app = setup().await;
    let w = app.world().await;
    let id = app.persona(&w.lider1, "800005", None).await;
    app.call("POST", &format!("/api/personas/{}/verificar", id), Some(&w.validador.token), None)
        .await;
    let uri = format!("/api/personas/{}/confirmar", id);

    let (status, _) = app
        .call("POST", &uri, Some(&w.confirmador.token), Some(photo_body("image/gif")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            &uri,
            Some(&w.confirmador.token),
            Some(json!({"photo_base64": "***", "content_type": "image/png"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            &uri,
            Some(&w.confirmador.token),
            Some(json!({"photo_base64": "", "content_type": "image/png"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    set_setting(&app.pool, EVIDENCE_MAX_BYTES, "1024").await.unwrap();
    let big = STANDARD.encode(vec![7u8; 4096]);
    let (status, body) = app
        .call(
            "POST",
            &uri,
            Some(&w.confirmador.token),
            Some(json!({"photo_base64": big, "content_type": "image/webp"})),
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");

    // Data URL prefix is accepted
    let data_url = format!("data:image/png;base64,{}", STANDARD.encode(PHOTO));
    let (status, _) = app
        .call(
            "POST",
            &uri,
            Some(&w.confirmador.token),
            Some(json!({"photo_base64": data_url, "content_type": "image/png"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(evidence_files(&app), 1);
    assert_eq!(app.estado_of(&w.admin, &id).await, "CONFIRMADO");
}

#[tokio::test]
async fn test_novedad_blocks_and_resolves() {
    let app = setup().await;
    let w = app.world().await;
    let id = app.persona(&w.lider1, "800006", None).await;

    let (status, novedad) = app
        .call(
            "POST",
            &format!("/api/personas/{}/novedades", id),
            Some(&w.coord1.token),
            Some(json!({"descripcion": "teléfono no contesta"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", novedad);
    assert_eq!(app.estado_of(&w.lider1, &id).await, "CON_NOVEDAD");

    let (status, _) = app
        .call("POST", &format!("/api/personas/{}/verificar", id), Some(&w.validador.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Data can still be corrected while the novedad is open
    let (status, _) = app
        .call(
            "PUT",
            &format!("/api/personas/{}", id),
            Some(&w.lider1.token),
            Some(json!({
                "documento": "800006", "nombres": "Ana", "apellidos": "Gómez",
                "telefono": "3109876543",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let resolve_uri = format!("/api/novedades/{}/resolve", novedad["id"].as_str().unwrap());
    let (status, resolved) = app
        .call(
            "POST",
            &resolve_uri,
            Some(&w.lider1.token),
            Some(json!({"resolution": "número corregido"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", resolved);
    assert_eq!(resolved["resolution"], "número corregido");
    assert_eq!(resolved["resolved_by"], w.lider1.id.to_string());
    assert_eq!(app.estado_of(&w.lider1, &id).await, "DATOS_PENDIENTES");

    let (status, _) = app
        .call(
            "POST",
            &resolve_uri,
            Some(&w.lider1.token),
            Some(json!({"resolution": "otra vez"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .call("POST", &format!("/api/personas/{}/verificar", id), Some(&w.validador.token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_estado_stays_con_novedad_until_last_resolved() {
    let app = setup().await;
    let w = app.world().await;
    let id = app.persona(&w.lider1, "800007", None).await;

    let mut ids = Vec::new();
    for descripcion in ["dirección incompleta", "mesa desconocida"] {
        let (status, n) = app
            .call(
                "POST",
                &format!("/api/personas/{}/novedades", id),
                Some(&w.validador.token),
                Some(json!({"descripcion": descripcion})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(n["id"].as_str().unwrap().to_string());
    }

    let (_, open) = app.call("GET", "/api/novedades", Some(&w.admin.token), None).await;
    assert_eq!(open.as_array().unwrap().len(), 2);

    app.call(
        "POST",
        &format!("/api/novedades/{}/resolve", ids[0]),
        Some(&w.coord1.token),
        Some(json!({"resolution": "ok"})),
    )
    .await;
    assert_eq!(app.estado_of(&w.admin, &id).await, "CON_NOVEDAD");

    let (_, detail) = app
        .call("GET", &format!("/api/personas/{}", id), Some(&w.admin.token), None)
        .await;
    assert_eq!(detail["open_novedades"], 1);

    app.call(
        "POST",
        &format!("/api/novedades/{}/resolve", ids[1]),
        Some(&w.coord1.token),
        Some(json!({"resolution": "ok"})),
    )
    .await;
    assert_eq!(app.estado_of(&w.admin, &id).await, "DATOS_PENDIENTES");

    let (_, open) = app.call("GET", "/api/novedades", Some(&w.admin.token), None).await;
    assert!(open.as_array().unwrap().is_empty());
    let (_, all) = app
        .call("GET", "/api/novedades?open=false", Some(&w.admin.token), None)
        .await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_no_novedad_on_confirmed_persona() {
    let app = setup().await;
    let w = app.world().await;
    let id = app.persona(&w.lider1, "800008", None).await;
    app.call("POST", &format!("/api/personas/{}/verificar", id), Some(&w.validador.token), None)
        .await;
    app.call(
        "POST",
        &format!("/api/personas/{}/confirmar", id),
        Some(&w.confirmador.token),
        Some(photo_body("image/png")),
    )
    .await;

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/personas/{}/novedades", id),
            Some(&w.validador.token),
            Some(json!({"descripcion": "tarde"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.estado_of(&w.admin, &id).await, "CONFIRMADO");
}

#[tokio::test]
async fn test_transitions_emit_events() {
    let app = setup().await;
    let w = app.world().await;
    let id = app.persona(&w.lider1, "800009", None).await;
    let mut rx = app.bus.subscribe();

    app.call("POST", &format!("/api/personas/{}/verificar", id), Some(&w.validador.token), None)
        .await;

    let VotrackEvent::PersonaEstadoChanged {
        persona_id,
        lider_id,
        coordinador_id,
        from,
        to,
        action,
        by,
        ..
    } = rx.try_recv().unwrap();
    assert_eq!(persona_id.to_string(), id);
    assert_eq!(lider_id, w.lider1.id);
    assert_eq!(coordinador_id, Some(w.coord1.id));
    assert_eq!(from, Estado::DatosPendientes);
    assert_eq!(to, Estado::Verificado);
    assert_eq!(action, Action::Verificar);
    assert_eq!(by, w.validador.id);

    // Rejected transitions emit nothing
    app.call("POST", &format!("/api/personas/{}/verificar", id), Some(&w.validador.token), None)
        .await;
    assert!(rx.try_recv().is_err());
}
