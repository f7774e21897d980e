//! End-to-end sequence tests against scripted in-memory instruments
//!
//! The device handles are generic over the I/O stream, so these tests wire
//! them to `tokio::io::duplex` pairs with a responder task playing the
//! instrument: the fake multimeter answers `:FETC?` from a script, the
//! fake supply just records what it is told.

use std::time::Duration;
use tokio::io::{ AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream };
use tokio::task::JoinHandle;
use tokio::time::timeout;
use beepcheck::{
    AcquisitionTiming, Connection, Multimeter, PowerSupply, SequenceError, SequencePlan, Volt,
    run_at_voltage, run_beep_sequence,
};

/// What the fake meter does with one `:FETC?`
enum FetchScript
{
    Reply(String),
    /// Simulates a hung instrument: the query is left unanswered
    Silent,
}

/// Spawns a fake multimeter; returns the host-side stream and the command
/// transcript (resolved once the host side is dropped)
fn scripted_multimeter(script: Vec<FetchScript>) -> (DuplexStream, JoinHandle<Vec<String>>)
{
    let (client, server) = tokio::io::duplex(64 * 1024);

    let responder = tokio::spawn(async move {
        let mut lines = BufReader::new(server).lines();
        let mut script = script.into_iter();
        let mut seen = Vec::new();

        while let Ok(Some(line)) = lines.next_line().await {
            seen.push(line.clone());

            if line == ":FETC?" {
                match script.next() {
                    Some(FetchScript::Reply(payload)) => {
                        let reply = format!("{}\n", payload);
                        if lines.get_mut().get_mut().write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Some(FetchScript::Silent) | None => {}
                }
            }
            else if line == "*IDN?" {
                if lines.get_mut().get_mut().write_all(b"MOCK,DMM-1,0,0.1\n").await.is_err() {
                    break;
                }
            }
        }

        seen
    });

    (client, responder)
}

/// Spawns a fake power supply that records every command line it receives
fn recording_power_supply() -> (DuplexStream, JoinHandle<Vec<String>>)
{
    let (client, server) = tokio::io::duplex(64 * 1024);

    let recorder = tokio::spawn(async move {
        let mut lines = BufReader::new(server).lines();
        let mut seen = Vec::new();

        while let Ok(Some(line)) = lines.next_line().await {
            seen.push(line);
        }

        seen
    });

    (client, recorder)
}

/// Timing with the physical waits removed so tests run at full speed
fn test_timing() -> AcquisitionTiming
{
    AcquisitionTiming {
        buffer_fill_per_sample: Duration::ZERO,
        timeout_floor: Duration::from_millis(800),
        ..AcquisitionTiming::default()
    }
}

fn test_plan() -> SequencePlan
{
    SequencePlan {
        main_voltage: Volt::from_volts(5.0),
        double_voltage: Volt::from_volts(5.2),
        triple_voltage: Volt::from_volts(5.4),
    }
}

fn flat_payload(len: usize, amps: f64) -> String
{
    vec![format!("{:.6}", amps); len].join(",")
}

fn spiked_payload(len: usize, spike_amps: f64, spikes: &[usize]) -> String
{
    (0..len)
        .map(|index| {
            if spikes.contains(&index) {
                format!("{:.6}", spike_amps)
            }
            else {
                "0.000000".to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[tokio::test]
async fn full_sequence_detects_double_and_triple()
{
    let (psu_stream, psu_log) = recording_power_supply();
    let (dmm_stream, dmm_log) = scripted_multimeter(vec![
        FetchScript::Reply(flat_payload(100, 0.010)),
        FetchScript::Reply(spiked_payload(100, 0.020, &[20, 40])),
        FetchScript::Reply(spiked_payload(600, 0.020, &[100, 300, 500])),
    ]);

    let mut psu = Connection::Connected(PowerSupply::with(psu_stream));
    let mut dmm = Multimeter::with(dmm_stream);

    let outcome = run_beep_sequence(&mut psu, &mut dmm, &test_plan(), &test_timing())
        .await
        .unwrap();

    assert_eq!(outcome.summary.main_voltage, 5.0);
    assert!((outcome.summary.max_current_ma - 10.0).abs() < 1e-6);
    assert!(outcome.summary.double_detected);
    assert!(outcome.summary.triple_detected);

    assert!((outcome.main_stats.mean.as_f64() - 0.010).abs() < 1e-9);
    assert!((outcome.main_stats.min.as_f64() - 0.010).abs() < 1e-9);

    assert_eq!(outcome.acquisitions.len(), 3);
    assert_eq!(outcome.acquisitions[0].readings.len(), 100);
    assert_eq!(outcome.acquisitions[1].readings.len(), 100);
    assert_eq!(outcome.acquisitions[2].readings.len(), 600);

    drop(psu);
    drop(dmm);

    let psu_cmds = psu_log.await.unwrap();
    // each run programs its own voltage, clamped to two decimals
    assert!(psu_cmds.contains(&":VOLT 5.00".to_string()));
    assert!(psu_cmds.contains(&":VOLT 5.20".to_string()));
    assert!(psu_cmds.contains(&":VOLT 5.40".to_string()));
    // the sequence parks the supply on its way out
    assert_eq!(
        &psu_cmds[psu_cmds.len() - 2..],
        &[":OUTP OFF".to_string(), ":VOLT 0.00".to_string()]
    );

    let dmm_cmds = dmm_log.await.unwrap();
    // fast profile for the first two runs, precise profile for the third
    assert_eq!(dmm_cmds.iter().filter(|cmd| *cmd == ":CURR:DC:NPLC 0.1").count(), 2);
    assert!(dmm_cmds.contains(&":CURR:DC:NPLC 1".to_string()));
    assert!(dmm_cmds.contains(&":SAMP:COUN 100".to_string()));
    assert!(dmm_cmds.contains(&":SAMP:COUN 600".to_string()));
    assert_eq!(dmm_cmds.iter().filter(|cmd| *cmd == ":FETC?").count(), 3);
}

#[tokio::test]
async fn hung_acquisition_fails_alone()
{
    let (psu_stream, _psu_log) = recording_power_supply();
    let (dmm_stream, _dmm_log) = scripted_multimeter(vec![
        FetchScript::Reply(flat_payload(100, 0.010)),
        // the double-beep fetch never answers; the run must time out and
        // yield no data without poisoning the triple-beep run
        FetchScript::Silent,
        FetchScript::Reply(spiked_payload(600, 0.020, &[100, 300, 500])),
    ]);

    let mut psu = Connection::Connected(PowerSupply::with(psu_stream));
    let mut dmm = Multimeter::with(dmm_stream);

    let outcome = run_beep_sequence(&mut psu, &mut dmm, &test_plan(), &test_timing())
        .await
        .unwrap();

    assert!(outcome.acquisitions[1].is_empty());
    assert!(!outcome.summary.double_detected);

    assert_eq!(outcome.acquisitions[2].readings.len(), 600);
    assert!(outcome.summary.triple_detected);
}

#[tokio::test]
async fn disconnected_supply_refuses_without_any_commands()
{
    let (dmm_stream, mut dmm_server) = tokio::io::duplex(1024);

    let mut psu = Connection::<PowerSupply<DuplexStream>>::Disconnected(
        "not found in available resources".to_string(),
    );
    let mut dmm = Multimeter::with(dmm_stream);

    let err = run_beep_sequence(&mut psu, &mut dmm, &test_plan(), &test_timing())
        .await
        .unwrap_err();

    assert!(matches!(err, SequenceError::PowerSupplyOffline(_)));

    // nothing may have been written to the meter either
    let mut buf = [0u8; 16];
    let silent = timeout(Duration::from_millis(50), dmm_server.read(&mut buf)).await;
    assert!(silent.is_err());
}

#[tokio::test]
async fn dataless_main_run_aborts_the_sequence()
{
    let (psu_stream, psu_log) = recording_power_supply();
    let (dmm_stream, dmm_log) = scripted_multimeter(vec![FetchScript::Reply(String::new())]);

    let mut psu = Connection::Connected(PowerSupply::with(psu_stream));
    let mut dmm = Multimeter::with(dmm_stream);

    let err = run_beep_sequence(&mut psu, &mut dmm, &test_plan(), &test_timing())
        .await
        .unwrap_err();

    assert!(matches!(err, SequenceError::NoMainReadings));

    drop(psu);
    drop(dmm);

    // the abort still parks the supply
    let psu_cmds = psu_log.await.unwrap();
    assert_eq!(
        &psu_cmds[psu_cmds.len() - 2..],
        &[":OUTP OFF".to_string(), ":VOLT 0.00".to_string()]
    );

    // the double and triple runs never started
    let dmm_cmds = dmm_log.await.unwrap();
    assert_eq!(dmm_cmds.iter().filter(|cmd| *cmd == ":FETC?").count(), 1);
}

#[tokio::test]
async fn run_at_voltage_energizes_then_releases()
{
    let (psu_stream, psu_log) = recording_power_supply();

    {
        let mut psu = PowerSupply::with(psu_stream);
        run_at_voltage(&mut psu, Volt::from_volts(4.0), Duration::ZERO)
            .await
            .unwrap();
    }

    let psu_cmds = psu_log.await.unwrap();
    assert_eq!(
        psu_cmds,
        vec![":INST CH1", ":VOLT 4.00", ":OUTP ON", ":OUTP OFF"]
    );
}
