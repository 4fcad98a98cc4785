use crate::support::Harness;
use conduit_core::render::{render_loaded, CardKind, DataView, DisplayModel, DisplayRow};
use conduit_core::{
    BackendError, DataLoader, HandshakeError, HandshakePhase, Identity, ItemTypeTag, LoadedData,
    ParamsUpdate, PopupWindow, ProviderName,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn company_connection_via_message_stores_company_credentials() {
    let h = Harness::new();
    h.backend.grant();
    h.store
        .update(ParamsUpdate::ItemType(ItemTypeTag::Company))
        .expect("supported");

    let handshake = h.handshake.clone();
    let task = tokio::spawn(async move {
        handshake
            .connect(&Identity::default(), ItemTypeTag::Company)
            .await
    });
    let popup = h.popup(1).await;
    h.post_success();

    let credentials = task.await.expect("join").expect("connected");
    let params = h.store.snapshot();
    assert_eq!(params.provider, ProviderName::Hubspot);
    assert_eq!(params.item_type, ItemTypeTag::Company);
    assert_eq!(params.credentials.as_ref(), Some(&credentials));
    assert_eq!(credentials.item_type(), Some("company"));
    assert_eq!(credentials.get("user_id"), Some("TestUser"));

    let opened = h.launcher.opened_urls();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].as_str().contains("state=hubspot"));
    assert!(!popup.is_closed());
    assert_eq!(h.bus.listener_count(), 0);
    assert_eq!(h.backend.calls().credentials, 1);
}

#[tokio::test(start_paused = true)]
async fn closing_the_popup_early_surfaces_the_backend_detail() {
    let h = Harness::new();

    let handshake = h.handshake.clone();
    let task = tokio::spawn(async move {
        handshake
            .connect(&Identity::default(), ItemTypeTag::Contact)
            .await
    });
    h.popup(1).await.close();

    let err = task.await.expect("join").unwrap_err();
    assert!(matches!(err, HandshakeError::Credentials { .. }));
    assert_eq!(
        err.user_message(),
        "No credentials found. Please authorize first."
    );
    assert_eq!(h.store.snapshot().credentials, None);
    assert!(matches!(h.handshake.phase(), HandshakePhase::Failed { .. }));
    assert_eq!(h.bus.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn simultaneous_signals_fetch_credentials_once() {
    let h = Harness::new();
    h.backend.grant();

    let handshake = h.handshake.clone();
    let task = tokio::spawn(async move {
        handshake
            .connect(&Identity::default(), ItemTypeTag::Contact)
            .await
    });
    let popup = h.popup(1).await;
    popup.close();
    h.post_success();

    task.await.expect("join").expect("connected");
    assert_eq!(h.backend.calls().credentials, 1);
    assert_eq!(h.bus.listener_count(), 0);
}

/// Records how many window-message listeners exist when credentials are fetched.
fn record_listeners_at_fetch(h: &Harness) -> Arc<AtomicUsize> {
    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    let recorded = Arc::clone(&seen);
    let bus = h.bus.clone();
    h.backend
        .on_fetch_credentials(move || recorded.store(bus.listener_count(), Ordering::SeqCst));
    seen
}

#[tokio::test(start_paused = true)]
async fn listener_is_gone_before_credentials_are_fetched() {
    let h = Harness::new();
    h.backend.grant();
    let seen = record_listeners_at_fetch(&h);

    let handshake = h.handshake.clone();
    let task = tokio::spawn(async move {
        handshake
            .connect(&Identity::default(), ItemTypeTag::Contact)
            .await
    });
    h.popup(1).await;
    h.post_success();
    task.await.expect("join").expect("connected");

    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn listener_is_gone_before_fetch_after_popup_close() {
    let h = Harness::new();
    let seen = record_listeners_at_fetch(&h);

    let handshake = h.handshake.clone();
    let task = tokio::spawn(async move {
        handshake
            .connect(&Identity::default(), ItemTypeTag::Contact)
            .await
    });
    h.popup(1).await.close();
    task.await.expect("join").unwrap_err();

    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_reconnect_keeps_earlier_credentials() {
    let h = Harness::new();
    h.backend.grant();

    let handshake = h.handshake.clone();
    let first = tokio::spawn(async move {
        handshake
            .connect(&Identity::default(), ItemTypeTag::Contact)
            .await
    });
    h.popup(1).await;
    h.post_success();
    let stored = first.await.expect("join").expect("connected");

    h.backend.fail_credentials(BackendError::rejected(
        "/integrations/hubspot/credentials",
        502,
        "HubSpot token endpoint unavailable",
    ));
    let handshake = h.handshake.clone();
    let second = tokio::spawn(async move {
        handshake
            .connect(&Identity::default(), ItemTypeTag::Contact)
            .await
    });
    h.popup(2).await.close();

    let err = second.await.expect("join").unwrap_err();
    assert_eq!(err.user_message(), "HubSpot token endpoint unavailable");
    assert_eq!(h.store.snapshot().credentials, Some(stored));
    assert!(h.store.is_connected());
}

#[tokio::test(start_paused = true)]
async fn item_type_change_after_connecting_updates_both_fields() {
    let h = Harness::new();
    h.backend.grant();

    let handshake = h.handshake.clone();
    let task = tokio::spawn(async move {
        handshake
            .connect(&Identity::default(), ItemTypeTag::Contact)
            .await
    });
    h.popup(1).await;
    h.post_success();
    task.await.expect("join").expect("connected");

    h.store
        .update(ParamsUpdate::ItemType(ItemTypeTag::Company))
        .expect("supported");

    let params = h.store.snapshot();
    assert_eq!(params.item_type, ItemTypeTag::Company);
    let credentials = params.credentials.expect("credentials kept");
    assert_eq!(credentials.item_type(), Some("company"));
    assert_eq!(credentials.get("org_id"), Some("TestOrg"));
}

#[tokio::test(start_paused = true)]
async fn connected_store_feeds_the_loader() {
    let h = Harness::new();
    h.backend.grant();
    h.backend.reply_to_load(Ok(serde_json::from_value(serde_json::json!({
        "items": [{"id": 1, "type": "contact", "email": "a@b.com"}]
    }))
    .expect("loaded data")));

    let handshake = h.handshake.clone();
    let task = tokio::spawn(async move {
        handshake
            .connect(&Identity::default(), ItemTypeTag::Contact)
            .await
    });
    h.popup(1).await;
    h.post_success();
    task.await.expect("join").expect("connected");

    let loader = DataLoader::new(Arc::new(h.backend.clone()));
    let data = loader.load_current(&h.store).await.expect("loaded");

    let DataView::Items { summary, entries } = render_loaded(&data) else {
        panic!("expected items");
    };
    assert_eq!(summary, "Found 1 items");
    let DisplayModel::Card(card) = &entries[0].model else {
        panic!("expected a card");
    };
    assert_eq!(card.kind, CardKind::Contact);
    assert_eq!(
        card.rows,
        vec![DisplayRow {
            label: "Email",
            value: "a@b.com".to_string()
        }]
    );
}

#[tokio::test]
async fn load_errors_come_back_verbatim() {
    let h = Harness::new();
    h.backend.reply_to_load(Err(BackendError::rejected(
        "/integrations/hubspot/load",
        401,
        "HubSpot token expired",
    )));
    let loader = DataLoader::new(Arc::new(h.backend.clone()));
    let credentials = conduit_core::Credentials::new().with("item_type", "contact");

    let err = loader
        .load(ProviderName::Hubspot, &credentials)
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "HubSpot token expired");

    h.backend
        .reply_to_load(Ok(LoadedData::failed("No HubSpot access token found")));
    let data = loader
        .load(ProviderName::Hubspot, &credentials)
        .await
        .expect("loaded");
    assert_eq!(data.error(), Some("No HubSpot access token found"));
}
