use std::sync::Arc;

use serde_json::json;
use waci_adapter::{
    core::{
        credential::{Presentation, ProofDocument},
        key::CorrelationKey,
        message::{
            Continuation, CREDENTIAL_MANIFEST_FORMAT, CREDENTIAL_RESPONSE_FORMAT,
            ISSUE_CREDENTIAL_V2, OFFER_CREDENTIAL_V2, PROPOSE_CREDENTIAL_V2,
            REQUEST_CREDENTIAL_V3,
        },
        record::ExchangeRecord,
        store::{get_json, put_json, MemoryStore},
    },
    exchange::{invitation::IssuanceForm, Initiator},
    orchestrator::Disposition,
};

mod support;

fn issuance_record() -> ExchangeRecord {
    ExchangeRecord {
        credential_manifest: Some(support::credential_manifest()),
        credential_response: Some(support::credential_response()),
        credential: Some(support::credential()),
        ..Default::default()
    }
}

#[tokio::test]
async fn credential_is_offered_then_issued_on_the_thread() {
    let store = Arc::new(MemoryStore::default());
    let signer = support::signer();
    let actions = support::orchestrator(store.clone(), signer.clone());

    let record = issuance_record();
    put_json(
        store.as_ref(),
        &CorrelationKey::issuance_data("inv-1"),
        &record,
    )
    .await
    .unwrap();

    // propose-credential picks the invitation up on thread t1
    let offered = actions
        .submit(support::message(json!({
            "@id": "t1",
            "@type": PROPOSE_CREDENTIAL_V2,
            "invitationID": "inv-1"
        })))
        .await
        .unwrap();
    let Disposition::Continue {
        continuation: Continuation::OfferCredential(offer),
    } = offered
    else {
        panic!("unexpected disposition {offered:?}")
    };
    assert_eq!(OFFER_CREDENTIAL_V2, offer.type_);
    assert_eq!(
        vec![
            Some(CREDENTIAL_MANIFEST_FORMAT),
            Some(CREDENTIAL_RESPONSE_FORMAT)
        ],
        offer
            .attachments
            .iter()
            .map(|attachment| attachment.format.as_deref())
            .collect::<Vec<_>>()
    );
    assert_eq!(
        record,
        ExchangeRecord::load(store.as_ref(), "t1").await.unwrap()
    );

    // The offered response is not signed yet.
    let offered_response =
        Presentation::try_from(offer.attachments[1].data.json.clone().unwrap()).unwrap();
    assert!(offered_response.proofs().unwrap().is_empty());

    // request-credential continues thread t1
    let issued = actions
        .submit(support::message(json!({
            "@id": "r1",
            "@type": REQUEST_CREDENTIAL_V3,
            "~thread": {"thid": "t1"}
        })))
        .await
        .unwrap();
    let Disposition::Continue {
        continuation: Continuation::IssueCredential(issuance),
    } = issued
    else {
        panic!("unexpected disposition {issued:?}")
    };
    assert_eq!(ISSUE_CREDENTIAL_V2, issuance.type_);
    assert_eq!(1, issuance.attachments.len());
    assert!(issuance.web_redirect.url.contains("t1"));
    assert_eq!(
        format!("{}/issuer/waci-issuance/t1", support::EXTERNAL_URL),
        issuance.web_redirect.url
    );

    let response =
        Presentation::try_from(issuance.attachments[0].data.json.clone().unwrap()).unwrap();
    signer.verify_presentation(&response).await.unwrap();

    let credentials = response.credentials().unwrap();
    assert_eq!(1, credentials.len());
    signer.verify_credential(&credentials[0]).await.unwrap();
    assert!(credentials[0].id().unwrap().starts_with("urn:uuid:"));
    assert_eq!(
        Some("did:example:ebfeb1f712ebc6f1c276e12ec21"),
        credentials[0].subject_id()
    );

    let outcome: serde_json::Value = get_json(
        store.as_ref(),
        &CorrelationKey::interaction_outcome("t1"),
    )
    .await
    .unwrap();
    assert_eq!(response.into_json(), outcome);
}

#[tokio::test]
async fn credential_id_in_the_response_is_assigned_before_signing() {
    let store = Arc::new(MemoryStore::default());
    let signer = support::signer();
    let actions = support::orchestrator(store.clone(), signer.clone());

    let mut response = support::credential_response();
    response["credential_response"]["id"] = json!("{{credential_id}}");
    let record = ExchangeRecord {
        credential_response: Some(response),
        ..issuance_record()
    };
    put_json(
        store.as_ref(),
        &CorrelationKey::issuance_data("inv-2"),
        &record,
    )
    .await
    .unwrap();

    let offered = actions
        .submit(support::message(json!({
            "@id": "t2",
            "@type": PROPOSE_CREDENTIAL_V2,
            "invitationID": "inv-2"
        })))
        .await
        .unwrap();
    assert!(matches!(
        offered,
        Disposition::Continue {
            continuation: Continuation::OfferCredential(_)
        }
    ));

    let issued = actions
        .submit(support::message(json!({
            "@id": "r2",
            "@type": REQUEST_CREDENTIAL_V3,
            "~thread": {"thid": "t2"}
        })))
        .await
        .unwrap();
    let Disposition::Continue {
        continuation: Continuation::IssueCredential(issuance),
    } = issued
    else {
        panic!("unexpected disposition {issued:?}")
    };

    let response =
        Presentation::try_from(issuance.attachments[0].data.json.clone().unwrap()).unwrap();
    signer.verify_presentation(&response).await.unwrap();

    let credentials = response.credentials().unwrap();
    signer.verify_credential(&credentials[0]).await.unwrap();
    let credential_id = credentials[0].id().unwrap();
    assert!(credential_id.starts_with("urn:uuid:"));
    assert_eq!(
        Some(&json!(credential_id)),
        response
            .get("credential_response")
            .and_then(|response| response.get("id"))
    );
}

#[tokio::test]
async fn issuance_started_from_the_form_reaches_the_offer() {
    let store = Arc::new(MemoryStore::default());
    let actions = support::orchestrator(store.clone(), support::signer());
    let initiator = Initiator::new(store.clone());

    let (invitation, redirect) = initiator
        .initiate_issuance(&IssuanceForm {
            cred_manifest: support::credential_manifest().to_string(),
            response: support::credential_response().to_string(),
            cred_to_issue: support::credential().to_string(),
            wallet_url: "https://wallet.example.com".into(),
        })
        .await
        .unwrap();
    assert!(redirect.starts_with("https://wallet.example.com/waci?oob="));

    let offered = actions
        .submit(support::message(json!({
            "@id": "thread-from-form",
            "@type": PROPOSE_CREDENTIAL_V2,
            "pthid": invitation.id
        })))
        .await
        .unwrap();
    assert!(matches!(
        offered,
        Disposition::Continue {
            continuation: Continuation::OfferCredential(_)
        }
    ));
    assert_eq!(
        issuance_record(),
        ExchangeRecord::load(store.as_ref(), "thread-from-form")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn request_on_an_unknown_thread_stops() {
    let store = Arc::new(MemoryStore::default());
    let actions = support::orchestrator(store.clone(), support::signer());

    let disposition = actions
        .submit(support::message(json!({
            "@id": "r1",
            "@type": REQUEST_CREDENTIAL_V3,
            "~thread": {"thid": "never-proposed"}
        })))
        .await
        .unwrap();

    let Disposition::Stop { reason } = disposition else {
        panic!("unexpected disposition {disposition:?}")
    };
    assert!(reason.contains("failed to get WACI issuance data"), "{reason}");
    assert!(store.is_empty().await);
}
