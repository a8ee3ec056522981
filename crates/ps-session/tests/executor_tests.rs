//! Executor and session lifecycle tests against the scripted console.

#![cfg(feature = "mock")]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ps_session::mock::{MockConnector, MockScript};
use ps_session::{
    CommandExecutor, ConsoleError, FailureKind, ReadPhase, SessionConfig, SessionConnection,
    SessionState, TransportError,
};

fn config() -> SessionConfig {
    SessionConfig::new("dc01.example.com", "abij")
        .password("secret")
        .poll_interval(Duration::from_millis(5))
}

fn executor(script: MockScript) -> (CommandExecutor<MockConnector>, MockConnector) {
    let connector = MockConnector::new(script);
    let executor = CommandExecutor::new(connector.clone(), config()).unwrap();
    (executor, connector)
}

#[tokio::test]
async fn execute_returns_sanitized_output() {
    let (executor, _) = executor(MockScript::new().reply("Get-ADUser", "SamAccountName : abij01"));

    let output = executor.execute("Get-ADUser -Identity abij01").await.unwrap();

    assert_eq!(output.command(), "Get-ADUser -Identity abij01");
    assert_eq!(output.output(), "SamAccountName : abij01");
    assert!(output.transcript().starts_with("Get-ADUser -Identity abij01"));
    assert!(output.transcript().ends_with(r"PS C:\Users\abij>"));
    assert_eq!(executor.state(), SessionState::ShellReady);
}

#[tokio::test]
async fn nothing_connects_before_first_use() {
    let (executor, connector) = executor(MockScript::new());
    assert_eq!(executor.state(), SessionState::Uninitialized);
    assert_eq!(connector.stats().connect_attempts, 0);
}

#[tokio::test]
async fn ensure_connected_twice_connects_and_loads_module_once() {
    let (executor, connector) = executor(MockScript::new());

    executor.ensure_connected().await.unwrap();
    executor.ensure_connected().await.unwrap();
    executor.execute("Get-Date").await.unwrap();

    let stats = connector.stats();
    assert_eq!(stats.connects, 1);
    assert_eq!(stats.shells, 1);
    assert_eq!(stats.module_loads, 1);
    assert_eq!(connector.lines()[0], "Import-Module ActiveDirectory");
}

#[tokio::test]
async fn remote_failure_carries_command_output_and_diagnostic() {
    let (executor, connector) = executor(
        MockScript::new().fail("New-ADUser", "The specified account already exists"),
    );

    let err = executor
        .execute(r#"New-ADUser -SamAccountName "abij01""#)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::RemoteCommand);
    match &err {
        ConsoleError::CommandFailed {
            command,
            diagnostic,
            output,
        } => {
            assert_eq!(command, "new-aduser");
            assert_eq!(diagnostic, "the specified account already exists");
            assert!(output.contains(r#"New-ADUser -SamAccountName "abij01""#));
            assert!(!output.contains("False"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // A reported failure leaves the console idle; the channel is kept.
    assert_eq!(executor.state(), SessionState::ShellReady);
    executor.execute("Get-Date").await.unwrap();
    assert_eq!(connector.stats().shells, 1);
}

#[tokio::test]
async fn silent_console_times_out_within_bound() {
    let read_timeout = Duration::from_millis(300);
    let connector = MockConnector::new(MockScript::new().hang("Start-Sleep"));
    let executor =
        CommandExecutor::new(connector.clone(), config().read_timeout(read_timeout)).unwrap();
    executor.ensure_connected().await.unwrap();

    let started = Instant::now();
    let err = executor.execute("Start-Sleep -Seconds 999").await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    assert_eq!(err.kind(), FailureKind::Timeout);
    assert!(elapsed >= read_timeout, "returned early: {elapsed:?}");
    assert!(
        elapsed < read_timeout + Duration::from_millis(5) + Duration::from_millis(50),
        "took too long: {elapsed:?}"
    );
    assert_eq!(err.buffer(), Some("Start-Sleep -Seconds 999"));
    assert!(matches!(
        err,
        ConsoleError::Timeout {
            phase: ReadPhase::Command,
            ..
        }
    ));
}

#[tokio::test]
async fn unanswered_status_query_times_out() {
    let connector = MockConnector::new(MockScript::new().hang_status("Set-ADUser"));
    let executor = CommandExecutor::new(
        connector.clone(),
        config().read_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    let err = executor.execute("Set-ADUser abij01 -Enabled $false").await.unwrap_err();

    assert!(
        matches!(
            err,
            ConsoleError::Timeout {
                phase: ReadPhase::StatusProbe,
                ..
            }
        ),
        "unexpected error: {err}"
    );
    assert_eq!(err.buffer(), Some("$?"));
    assert_eq!(executor.state(), SessionState::TransportConnected);
    assert_eq!(connector.stats().channel_closes, 1);

    executor.execute("Get-Date").await.unwrap();
    assert_eq!(connector.stats().shells, 2);
}

#[tokio::test]
async fn slow_module_load_within_bootstrap_timeout_succeeds() {
    let connector = MockConnector::new(
        MockScript::new().slow("Import-Module", Duration::from_millis(300)),
    );
    let executor = CommandExecutor::new(
        connector.clone(),
        config()
            .read_timeout(Duration::from_millis(100))
            .bootstrap_timeout(Duration::from_secs(2)),
    )
    .unwrap();

    executor.execute("Get-Date").await.unwrap();

    let stats = connector.stats();
    assert_eq!(stats.module_loads, 1);
    assert_eq!(stats.shells, 1);
    assert_eq!(executor.state(), SessionState::ShellReady);
}

#[tokio::test]
async fn module_load_slower_than_bootstrap_timeout_fails() {
    let connector = MockConnector::new(
        MockScript::new().slow("Import-Module", Duration::from_secs(2)),
    );
    let executor = CommandExecutor::new(
        connector.clone(),
        config()
            .read_timeout(Duration::from_secs(5))
            .bootstrap_timeout(Duration::from_millis(150)),
    )
    .unwrap();

    let started = Instant::now();
    let err = executor.execute("Get-Date").await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());

    assert_eq!(err.kind(), FailureKind::Bootstrap);
    let ConsoleError::Bootstrap { source } = &err else {
        panic!("unexpected error: {err}");
    };
    assert!(
        matches!(
            **source,
            ConsoleError::Timeout {
                phase: ReadPhase::Bootstrap,
                ..
            }
        ),
        "unexpected source: {source}"
    );
    assert_eq!(source.buffer(), Some("Import-Module ActiveDirectory"));
    assert_eq!(executor.state(), SessionState::TransportConnected);
    assert!(!connector.lines().iter().any(|l| l == "Get-Date"));
}

#[tokio::test]
async fn timeout_closes_channel_and_next_command_reopens_it() {
    let connector = MockConnector::new(MockScript::new().hang("Start-Sleep"));
    let executor = CommandExecutor::new(
        connector.clone(),
        config().read_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    executor.execute("Start-Sleep 999").await.unwrap_err();
    assert_eq!(executor.state(), SessionState::TransportConnected);
    assert_eq!(connector.stats().channel_closes, 1);

    executor.execute("Get-Date").await.unwrap();
    let stats = connector.stats();
    assert_eq!(stats.connects, 1);
    assert_eq!(stats.shells, 2);
    assert_eq!(stats.module_loads, 2);
}

#[tokio::test]
async fn concurrent_callers_never_interleave() {
    let connector = MockConnector::new(MockScript::new().latency(Duration::from_millis(2)));
    let executor = Arc::new(CommandExecutor::new(connector.clone(), config()).unwrap());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.execute(&format!("Write-Output task{i}")).await })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let output = task.await.unwrap().unwrap();
        assert!(output.transcript().contains(&format!("task{i}")));
        for other in (0..8).filter(|other| *other != i) {
            assert!(!output.transcript().contains(&format!("task{other}")));
        }
    }

    let lines = connector.lines();
    assert_eq!(lines.len(), 2 + 2 * 8);
    assert_eq!(lines[0], "Import-Module ActiveDirectory");
    assert_eq!(lines[1], "$?");
    for pair in lines[2..].chunks(2) {
        assert!(pair[0].starts_with("Write-Output task"), "{pair:?}");
        assert_eq!(pair[1], "$?");
    }
    assert_eq!(connector.stats().connects, 1);
}

#[tokio::test]
async fn channel_drop_reopens_without_reauthentication() {
    let connector = MockConnector::new(MockScript::new());
    let mut session = SessionConnection::new(connector.clone(), config()).unwrap();

    session.ensure_connected().await.unwrap();
    connector.drop_shell();
    session.ensure_connected().await.unwrap();

    let stats = connector.stats();
    assert_eq!(stats.connects, 1);
    assert_eq!(stats.connect_attempts, 1);
    assert_eq!(stats.shells, 2);
    assert_eq!(session.state(), SessionState::ShellReady);
}

#[tokio::test]
async fn lost_transport_is_terminal() {
    let (executor, connector) = executor(MockScript::new());
    executor.execute("Get-Date").await.unwrap();

    connector.drop_transport();
    let err = executor.execute("Get-Date").await.unwrap_err();

    assert!(matches!(err, ConsoleError::CredentialSpent));
    assert_eq!(err.kind(), FailureKind::Connection);
    assert_eq!(executor.state(), SessionState::Closed);
    assert_eq!(connector.stats().connect_attempts, 1);

    // Still terminal on the next call.
    assert!(matches!(
        executor.ensure_connected().await,
        Err(ConsoleError::CredentialSpent)
    ));
}

#[tokio::test]
async fn bootstrap_failure_closes_channel() {
    let (executor, connector) = executor(
        MockScript::new().fail("Import-Module", "The specified module 'ActiveDirectory' was not loaded"),
    );

    let err = executor.execute("Get-ADUser abij01").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Bootstrap);
    let ConsoleError::Bootstrap { source } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(source.kind(), FailureKind::RemoteCommand);
    assert!(err.to_string().contains("was not loaded"));

    let stats = connector.stats();
    assert_eq!(stats.channel_closes, 1);
    assert_eq!(stats.module_loads, 0);
    assert_eq!(executor.state(), SessionState::TransportConnected);
    // The command itself was never sent.
    assert!(!connector.lines().iter().any(|l| l.starts_with("Get-ADUser")));
}

#[tokio::test]
async fn bootstrap_can_be_disabled() {
    let connector = MockConnector::new(MockScript::new());
    let executor = CommandExecutor::new(connector.clone(), config().no_bootstrap()).unwrap();

    executor.execute("Get-Date").await.unwrap();

    assert_eq!(connector.stats().module_loads, 0);
    assert_eq!(connector.lines(), vec!["Get-Date".to_string(), "$?".to_string()]);
}

#[tokio::test]
async fn failed_connect_keeps_credential_for_retry() {
    let (executor, connector) = executor(MockScript::new().failing_connects(1));

    let err = executor.execute("Get-Date").await.unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::Transport(TransportError::Connection { .. })
    ));
    assert_eq!(executor.state(), SessionState::Initialized);

    executor.execute("Get-Date").await.unwrap();
    let stats = connector.stats();
    assert_eq!(stats.connect_attempts, 2);
    assert_eq!(stats.connects, 1);
    assert_eq!(stats.transports, 1);
}

#[tokio::test]
async fn rejected_password_is_an_authentication_error() {
    let (executor, _) = executor(MockScript::new().password("correct horse"));

    let err = executor.execute("Get-Date").await.unwrap_err();

    assert!(matches!(
        err,
        ConsoleError::Transport(TransportError::Authentication { .. })
    ));
    assert!(!err.to_string().contains("secret"));
}

#[tokio::test]
async fn channel_closed_mid_command() {
    let (executor, connector) = executor(MockScript::new().close_on("Stop-Computer"));

    let err = executor.execute("Stop-Computer -Force").await.unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::ChannelClosed {
            phase: ReadPhase::Command,
            ..
        }
    ));
    assert_eq!(executor.state(), SessionState::TransportConnected);

    executor.execute("Get-Date").await.unwrap();
    assert_eq!(connector.stats().shells, 2);
    assert_eq!(connector.stats().connects, 1);
}

#[tokio::test]
async fn execute_all_stops_at_first_failure() {
    let (executor, connector) = executor(MockScript::new().fail("Remove-ADUser", "Cannot find an object"));

    let err = executor
        .execute_all(["Get-Date", "Remove-ADUser -identity ghost", "Get-Date"])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::RemoteCommand);
    let commands: Vec<String> = connector
        .lines()
        .into_iter()
        .filter(|line| line != "$?")
        .collect();
    assert_eq!(
        commands,
        vec![
            "Import-Module ActiveDirectory".to_string(),
            "Get-Date".to_string(),
            "Remove-ADUser -identity ghost".to_string(),
        ]
    );
}

#[tokio::test]
async fn execute_all_returns_every_output() {
    let (executor, _) = executor(MockScript::new().reply("Get-Date", "today"));

    let outputs = executor.execute_all(vec!["Get-Date", "Get-Date"]).await.unwrap();

    assert_eq!(outputs.len(), 2);
    assert!(outputs.iter().all(|o| o.output() == "today"));
}

#[tokio::test]
async fn cancelled_command_replaces_channel() {
    let (executor, connector) = executor(MockScript::new().hang("Start-Sleep"));
    executor.ensure_connected().await.unwrap();

    let cancelled =
        tokio::time::timeout(Duration::from_millis(50), executor.execute("Start-Sleep 999")).await;
    assert!(cancelled.is_err());

    executor.execute("Get-Date").await.unwrap();
    let stats = connector.stats();
    assert_eq!(stats.shells, 2);
    assert_eq!(stats.connects, 1);
}

#[tokio::test]
async fn byte_at_a_time_output_with_escape_noise() {
    let (executor, _) = executor(
        MockScript::new()
            .chunk_size(1)
            .reply("Get-ADUser", "\x1b[32mEnabled : True\x1b[0m"),
    );

    let output = executor.execute("Get-ADUser abij01").await.unwrap();

    assert_eq!(output.output(), "Enabled : True");
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (executor, connector) = executor(MockScript::new());
    executor.execute("Get-Date").await.unwrap();

    executor.disconnect().await;
    executor.disconnect().await;

    let stats = connector.stats();
    assert_eq!(stats.disconnects, 1);
    assert_eq!(stats.channel_closes, 1);
    assert_eq!(executor.state(), SessionState::Closed);
}

#[tokio::test]
async fn close_failure_still_disconnects_transport() {
    let (executor, connector) = executor(MockScript::new().fail_close());
    executor.execute("Get-Date").await.unwrap();

    executor.disconnect().await;

    let stats = connector.stats();
    assert_eq!(stats.channel_closes, 1);
    assert_eq!(stats.disconnects, 1);
    assert_eq!(executor.state(), SessionState::Closed);
}

#[tokio::test]
async fn disconnect_before_connect_keeps_session_usable() {
    let (executor, connector) = executor(MockScript::new());

    executor.disconnect().await;
    assert_eq!(executor.state(), SessionState::Uninitialized);

    executor.execute("Get-Date").await.unwrap();
    assert_eq!(connector.stats().connects, 1);
}

/// Log sink shared with the subscriber.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn trace_logs_leave_out_command_arguments() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (executor, _) = executor(
        MockScript::new().fail("New-ADUser", "The password does not meet the length requirements"),
    );
    executor
        .execute(r#"New-ADUser -AccountPassword (ConvertTo-SecureString -AsPlainText "Hunter2Hunter2" -Force)"#)
        .await
        .unwrap_err();

    let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("Sending command"), "{logs}");
    assert!(logs.contains("New-ADUser"), "{logs}");
    assert!(!logs.contains("Hunter2Hunter2"), "{logs}");
}

#[test]
fn session_requires_credential() {
    let config = SessionConfig::new("dc01", "abij");
    let err = SessionConnection::new(MockConnector::default(), config).err().unwrap();
    assert_eq!(err.kind(), FailureKind::Configuration);
}

#[test]
fn session_rejects_invalid_config() {
    let config = SessionConfig::new("", "abij").password("pw");
    assert!(SessionConnection::new(MockConnector::default(), config).is_err());
}
