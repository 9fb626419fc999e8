//! Lifecycle tests over a scripted transport and a recording clock.
//!
//! Every scenario runs without real sleeping or networking, so attempt
//! counts and delays can be asserted exactly.

mod common;

use std::io::Read;
use std::time::Duration;

use common::*;
use dpae_client::{PollPolicy, Resolved};
use dpae_core::{
    CredentialError, DeclarationContext, DpaeError, FluxId, ProtocolError, SessionToken,
    TransportError, ValidationError,
};

fn policy(max_retries: u32) -> PollPolicy {
    PollPolicy {
        initial_delay: Duration::from_secs(30),
        retry_delay: Duration::from_secs(10),
        max_retries,
    }
}

fn gunzip(bytes: &[u8]) -> Vec<u8> {
    let mut raw = Vec::new();
    flate2::read::GzDecoder::new(bytes).read_to_end(&mut raw).unwrap();
    raw
}

#[tokio::test]
async fn certified_after_three_attempts() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(format!("  {TOKEN}\n"))])
        .on(&submit_url(), vec![flux_ack(FLUX_ID)])
        .on(
            &consultation_url(),
            vec![empty_feed(), empty_feed(), feed(&[result_url(1)])],
        )
        .on(&result_url(1), vec![certified_doc("ABCDEFGHIJ")]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let resolved = client.declare(context(), password()).await.unwrap();

    assert!(resolved.is_certified());
    assert_eq!(transport.count(&consultation_url()), 3);
    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_secs(30),
            Duration::from_secs(10),
            Duration::from_secs(10)
        ]
    );

    let ctx = resolved.context();
    assert_eq!(ctx.flux_id.as_ref().map(FluxId::as_str), Some(FLUX_ID));
    assert_eq!(ctx.employee.birth_department.as_deref(), Some("99"));
    assert_eq!(ctx.employer.health_service.as_deref(), Some("01"));
    assert!(ctx.certificate_error.is_none());
    let payload = ctx.rendered_payload.as_deref().unwrap();
    assert!(payload.contains("<FR_DUE_Upload.Test.Indicator> 1 </FR_DUE_Upload.Test.Indicator>"));

    assert_eq!(resolved.into_certificate().unwrap().as_str(), "ABCDEFGHIJ");
}

#[tokio::test]
async fn requests_carry_expected_headers_and_payload() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&submit_url(), vec![flux_ack(FLUX_ID)])
        .on(&consultation_url(), vec![feed(&[result_url(1)])])
        .on(&result_url(1), vec![certified_doc("ABCDEFGHIJ")]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(2));

    client.declare(context(), password()).await.unwrap();

    let requests = transport.requests();
    let auth = &requests[0];
    assert_eq!(auth.url, auth_url());
    assert_eq!(auth.header_value("Content-Type"), Some("application/xml"));
    let auth_body = String::from_utf8(auth.body.to_vec()).unwrap();
    assert!(auth_body.contains("<motdepasse>s3cret-pass</motdepasse>"));
    assert!(auth_body.contains("<service>25</service>"));

    let submit = &requests[1];
    assert_eq!(submit.header_value("Content-Encoding"), Some("gzip"));
    assert_eq!(submit.header_value("Content-Type"), Some("application/xml"));
    assert_eq!(
        submit.header_value("Authorization"),
        Some("DSNLogin jeton=tok-0123456789abcdef")
    );
    let raw = gunzip(&submit.body);
    assert!(raw.starts_with(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\" ?>"));
    assert!(raw.windows(8).any(|w| w == b"Cr\xe9mieux"));

    let consult = &requests[2];
    assert_eq!(consult.url, format!("{}{FLUX_ID}", consultation_url()));
    assert_eq!(
        consult.header_value("Authorization"),
        Some("DSNLogin jeton=tok-0123456789abcdef")
    );
    assert_eq!(requests[3].url, result_url(1));
}

#[tokio::test]
async fn rejection_carries_reason() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&submit_url(), vec![flux_ack(FLUX_ID)])
        .on(&consultation_url(), vec![feed(&[result_url(1)])])
        .on(&result_url(1), vec![rejected_doc("Numéro SIRET invalide")]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let resolved = client.declare(context(), password()).await.unwrap();

    match &resolved {
        Resolved::Rejected(declaration) => assert_eq!(declaration.reason(), "Numéro SIRET invalide"),
        Resolved::Certified(_) => panic!("expected rejection"),
    }
    assert_eq!(
        resolved.context().certificate_error.as_deref(),
        Some("Numéro SIRET invalide")
    );
    assert!(resolved.context().certificate.is_none());

    let err = resolved.into_certificate().unwrap_err();
    assert!(err.is_rejection());
    assert!(err.to_string().contains("Numéro SIRET invalide"));
}

#[tokio::test]
async fn polling_is_bounded_when_transport_keeps_failing() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&submit_url(), vec![flux_ack(FLUX_ID)])
        .on(&consultation_url(), vec![unreachable(&consultation_url())]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(3));

    let err = client.declare(context(), password()).await.unwrap_err();

    match err {
        DpaeError::RetryExhausted { flux_id, tries } => {
            assert_eq!(flux_id, FLUX_ID);
            assert_eq!(tries, 3);
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(transport.count(&consultation_url()), 4);
    assert_eq!(clock.sleeps().len(), 4);
}

#[tokio::test]
async fn error_statuses_and_bad_feeds_are_retried() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&submit_url(), vec![flux_ack(FLUX_ID)])
        .on(
            &consultation_url(),
            vec![
                status(503, "maintenance"),
                ok("<html>not json</html>"),
                feed(&[result_url(1)]),
                feed(&[result_url(1)]),
            ],
        )
        .on(
            &result_url(1),
            vec![status(500, "oops"), certified_doc("ABCDEFGHIJ")],
        );
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(10));

    let resolved = client.declare(context(), password()).await.unwrap();

    assert!(resolved.is_certified());
    assert_eq!(transport.count(&consultation_url()), 4);
    assert_eq!(transport.count(&result_url(1)), 2);
}

#[tokio::test]
async fn non_dpae_documents_are_skipped() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&submit_url(), vec![flux_ack(FLUX_ID)])
        .on(&consultation_url(), vec![feed(&[result_url(1), result_url(2)])])
        .on(
            &result_url(1),
            vec![ok(r#"<retour profil="DSN"><etat_conformite>KO</etat_conformite></retour>"#)],
        )
        .on(&result_url(2), vec![certified_doc("ZYXWVUTSRQ")]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(5));

    let certificate = client
        .declare(context(), password())
        .await
        .unwrap()
        .into_certificate()
        .unwrap();

    assert_eq!(certificate.as_str(), "ZYXWVUTSRQ");
    assert_eq!(transport.count(&consultation_url()), 1);
}

#[tokio::test]
async fn protocol_errors_stop_polling_at_once() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&submit_url(), vec![flux_ack(FLUX_ID)])
        .on(&consultation_url(), vec![feed(&[result_url(1)])])
        .on(
            &result_url(1),
            vec![ok(r#"<retour profil="DPAE"><etat_conformite>OK</etat_conformite></retour>"#)],
        );
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let err = client.declare(context(), password()).await.unwrap_err();

    assert!(matches!(
        err,
        DpaeError::Protocol(ProtocolError::MissingCertificate)
    ));
    assert_eq!(transport.count(&consultation_url()), 1);
}

#[tokio::test]
async fn short_idflux_is_a_protocol_error() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&submit_url(), vec![flux_ack("1234567890123456789012")]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let err = client.declare(context(), password()).await.unwrap_err();

    assert!(matches!(
        err,
        DpaeError::Protocol(ProtocolError::InvalidIdFluxLength { length: 22, .. })
    ));
    assert_eq!(transport.count(&consultation_url()), 0);
}

#[tokio::test]
async fn submission_error_status_is_fatal() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&submit_url(), vec![status(500, "erreur interne")]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let err = client.declare(context(), password()).await.unwrap_err();

    assert!(matches!(
        err,
        DpaeError::Transport(TransportError::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn unreachable_endpoints_fail_authentication_and_submission_once() {
    let transport = ScriptedTransport::new();
    transport.on(&auth_url(), vec![unreachable(&auth_url())]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let err = client.declare(context(), password()).await.unwrap_err();
    assert!(matches!(
        err,
        DpaeError::Transport(TransportError::Connection { .. })
    ));
    assert_eq!(transport.requests().len(), 1);

    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&submit_url(), vec![unreachable(&submit_url())]);
    let client = common::client(&transport, &clock, policy(60));

    let err = client.declare(context(), password()).await.unwrap_err();
    assert!(matches!(
        err,
        DpaeError::Transport(TransportError::Connection { .. })
    ));
    assert_eq!(transport.count(&submit_url()), 1);
    assert_eq!(transport.count(&consultation_url()), 0);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_declarations_run_on_separate_tasks() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&submit_url(), vec![flux_ack(FLUX_ID)])
        .on(&consultation_url(), vec![feed(&[result_url(1)])])
        .on(&result_url(1), vec![certified_doc("ABCDEFGHIJ")]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.declare(context(), password()).await })
        })
        .collect();
    for handle in handles {
        let resolved = handle.await.unwrap().unwrap();
        assert!(resolved.is_certified());
    }

    assert_eq!(transport.count(&auth_url()), 4);
    assert_eq!(transport.count(&submit_url()), 4);
}

#[tokio::test]
async fn authentication_outcomes() {
    let cases = [
        (status(422, ""), "rejected"),
        (status(500, "down"), "status"),
        (ok("  abc  "), "short"),
    ];
    for (reply, case) in cases {
        let transport = ScriptedTransport::new();
        transport.on(&auth_url(), vec![reply]);
        let clock = RecordingClock::new();
        let client = client(&transport, &clock, policy(60));

        let err = client
            .declaration(context())
            .authenticate(password())
            .await
            .unwrap_err();

        match case {
            "rejected" => assert!(matches!(err, DpaeError::Credential(CredentialError::Rejected))),
            "status" => assert!(matches!(
                err,
                DpaeError::Transport(TransportError::Status { status: 500, .. })
            )),
            _ => assert!(matches!(
                err,
                DpaeError::Credential(CredentialError::InvalidToken { length: 3 })
            )),
        }
        assert_eq!(transport.requests().len(), 1);
    }
}

#[tokio::test]
async fn authenticating_with_a_held_token_is_idempotent() {
    let transport = ScriptedTransport::new();
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let authenticated = client
        .declaration(context())
        .with_session_token(SessionToken::new(TOKEN).unwrap())
        .authenticate(password())
        .await
        .unwrap();
    assert_eq!(authenticated.session_token().expose(), TOKEN);

    let again = client
        .declaration(authenticated.into_context())
        .authenticate(password())
        .await
        .unwrap();
    assert_eq!(again.state_name(), "AUTHENTICATED");
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn short_held_token_is_replaced() {
    let transport = ScriptedTransport::new();
    transport.on(&auth_url(), vec![ok("tok-fresh-0123456789")]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let authenticated = client
        .declaration(context())
        .with_session_token(SessionToken::new("0123456789").unwrap())
        .authenticate(password())
        .await
        .unwrap();

    assert_eq!(authenticated.session_token().expose(), "tok-fresh-0123456789");
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn invalid_input_never_reaches_the_transport() {
    let transport = ScriptedTransport::new();
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let err = client
        .declaration(context())
        .authenticate(zeroize::Zeroizing::new(String::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DpaeError::Validation(ValidationError::MissingField("password"))
    ));

    let mut ctx = context();
    ctx.credentials.organization_id.clear();
    let err = client.declaration(ctx).authenticate(password()).await.unwrap_err();
    assert!(matches!(
        err,
        DpaeError::Validation(ValidationError::MissingField(_))
    ));

    let mutations: [fn(&mut DeclarationContext); 5] = [
        |c| c.contract.nature_code = "CDX".into(),
        |c| c.credentials.service_code = "26".into(),
        |c| c.environment_indicator = 2,
        |c| c.employee.birth_date = "30/02/1985".into(),
        |c| c.employer.phone = "01 € 02".into(),
    ];
    for mutate in mutations {
        let mut ctx = context();
        mutate(&mut ctx);
        let err = client
            .declaration(ctx)
            .with_session_token(SessionToken::new(TOKEN).unwrap())
            .authenticate(password())
            .await
            .unwrap()
            .submit()
            .await
            .unwrap_err();
        assert!(matches!(err, DpaeError::Validation(_)), "got {err:?}");
    }

    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn tracking_resumes_polling_of_an_earlier_submission() {
    let transport = ScriptedTransport::new();
    transport
        .on(&auth_url(), vec![ok(TOKEN)])
        .on(&consultation_url(), vec![feed(&[result_url(1)])])
        .on(&result_url(1), vec![certified_doc("ABCDEFGHIJ")]);
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));

    let resolved = client
        .resume(context(), password(), FluxId::new(FLUX_ID).unwrap())
        .await
        .unwrap();

    assert!(resolved.is_certified());
    assert_eq!(transport.count(&submit_url()), 0);
    assert_eq!(
        resolved.context().flux_id.as_ref().map(FluxId::as_str),
        Some(FLUX_ID)
    );
}

#[tokio::test]
async fn cancellation_stops_the_lifecycle() {
    let transport = ScriptedTransport::new();
    let clock = RecordingClock::new();
    let client = client(&transport, &clock, policy(60));
    client.cancellation_token().cancel();

    let err = client
        .declaration(context())
        .with_session_token(SessionToken::new(TOKEN).unwrap())
        .authenticate(password())
        .await
        .unwrap()
        .submit()
        .await
        .unwrap_err();

    assert!(matches!(err, DpaeError::Cancelled));
    assert!(transport.requests().is_empty());
}
