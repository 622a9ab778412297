//! Main guidance executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and the guidance core
//!     - Start the fix source (simulator or the parser on stdin)
//!     - Main loop, one cycle per fix period:
//!         - Telecommand processing and handling
//!         - Fix acquisition, only the newest fix is used
//!         - Coverage map demands for the section look-ahead polygons
//!         - Guidance core processing
//!         - Coverage map painting
//!         - Archive writing
//!     - On the end of the script close the job and save the run summary
//!
//! # Modules
//!
//! All modules (e.g. `section`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use guid_lib::{
    coverage::{CoverageMap, CoverageMapParams, CoverageRecord},
    data_store::DataStore,
    fix_handoff::{fix_channel, FixSender, HandoffError},
    guid_core::{InputData, TickError},
    params::VehicleGeometryConfig,
    tc_processor,
};
#[cfg(feature = "sim")]
use guid_lib::sim::{SimClient, SimParams};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use serde::Serialize;
use structopt::StructOpt;

// Internal
use comms_if::eqpt::gnss::RawFix;
use util::{
    archive::Archived,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of seconds without a fix before a warning is issued.
const MISSING_FIX_WARN_S: f64 = 2.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line options.
#[derive(Debug, StructOpt)]
#[structopt(name = "guid_exec", about = "Section control and coverage guidance core")]
struct Opt {
    /// Telecommand script to run, the executable stops at the end of the script
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,

    /// Vehicle geometry file, defaults to `params/guid_exec.toml` under the software root
    #[structopt(long, parse(from_os_str))]
    geometry: Option<PathBuf>,

    /// Read fixes as JSON lines from stdin instead of running the simulator
    #[structopt(long)]
    stdin: bool,

    /// Minimum level of log messages
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,
}

/// Totals saved into the session at the end of the run.
#[derive(Debug, Serialize)]
struct RunSummary {
    num_cycles: u64,
    num_rejected_fixes: u64,
    num_skipped_fixes: u64,
    last_job_record: Option<CoverageRecord>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Various sources for the telecommands incoming to the exec.
enum TcSource {
    None,
    Script(ScriptInterpreter),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("guid_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("Guidance Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let geometry_path = match opt.geometry {
        Some(ref p) => p.clone(),
        None => {
            let mut p = host::get_guid_sw_root()
                .wrap_err("The software root environment variable is not set")?;
            p.push("params");
            p.push("guid_exec.toml");
            p
        }
    };

    let config = VehicleGeometryConfig::load_path(&geometry_path)
        .wrap_err_with(|| format!("Could not load the vehicle geometry from {:?}", geometry_path))?;
    let cycle_frequency_hz = config.fix.fix_rate_hz as f64;
    let cycle_period = Duration::from_secs_f64(1.0 / cycle_frequency_hz);

    let coverage_map_params: CoverageMapParams =
        util::params::load("coverage_map.toml").wrap_err("Could not load coverage map params")?;
    coverage_map_params
        .validate()
        .wrap_err("Invalid coverage map params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE TC SOURCE ----

    let mut tc_source = match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            TcSource::Script(si)
        }
        None => {
            info!("No script provided, the job must be driven by another collaborator\n");
            TcSource::None
        }
    };

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore {
        geometry_path,
        coverage_map: CoverageMap::new(coverage_map_params),
        ..Default::default()
    };

    // ---- INITIALISE MODULES ----

    ds.guid_core
        .init(config)
        .wrap_err("Failed to initialise GuidCore")?;
    ds.guid_core
        .enable_archives(&session)
        .wrap_err("Failed to enable the GuidCore archives")?;
    info!("GuidCore init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE FIX SOURCE ----

    let (fix_tx, mut fix_rx) = fix_channel();

    #[cfg(feature = "sim")]
    let mut sim_client = None;

    if opt.stdin {
        spawn_stdin_parser(fix_tx).wrap_err("Failed to start the stdin fix parser")?;
        info!("Reading fixes from stdin");
    }
    else {
        #[cfg(feature = "sim")]
        {
            let sim_params: SimParams =
                util::params::load("sim.toml").wrap_err("Could not load sim params")?;
            sim_client = Some(
                SimClient::new(sim_params, cycle_frequency_hz, fix_tx)
                    .wrap_err("Failed to initialise the SimClient")?,
            );
            info!("SimClient initialised");
        }
        #[cfg(not(feature = "sim"))]
        {
            drop(fix_tx);
            return Err(color_eyre::eyre::eyre!(
                "No fix source, build with the sim feature or pass --stdin"
            ));
        }
    }

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(cycle_frequency_hz);

        // ---- TELECOMMAND PROCESSING ----

        match tc_source {
            TcSource::None => (),
            TcSource::Script(ref mut si) => match si.get_pending_tcs() {
                PendingTcs::None => (),
                PendingTcs::Some(tc_vec) => {
                    for tc in tc_vec.iter() {
                        tc_processor::exec(&mut ds, tc);
                    }
                }
                // Exit if end of script reached
                PendingTcs::EndOfScript => {
                    info!("End of TC script reached, stopping");
                    break;
                }
            },
        }

        // ---- FIX ACQUISITION ----

        let fix = match fix_rx.latest() {
            Ok(f) => f,
            Err(HandoffError::Disconnected) => {
                warn!("The fix source has stopped, stopping");
                break;
            }
        };

        // ---- GUIDANCE PROCESSING ----

        match fix {
            Some(fix) => {
                ds.num_consec_missing_fixes = 0;

                // Ask the coverage map about the polygons from the previous tick
                ds.coverage_demands = ds.coverage_map.demands(ds.guid_core.polygons());

                let input = InputData {
                    fix,
                    demands: ds.coverage_demands,
                };

                match ds.guid_core.proc(&input) {
                    Ok((view, report)) => {
                        for e in report.timing_errors.iter() {
                            warn!("Section timing: {}", e);
                        }
                        if report.user_area_alarm_raised {
                            warn!(
                                "User area alarm: {:.1} m^2 applied",
                                view.coverage.user_area_m2
                            );
                        }

                        ds.coverage_map.update(&view.strips());

                        if ds.is_1_hz_cycle {
                            info!(
                                "Job area {:.1} m^2, sections on {:08b}, map covers {:.1} m^2",
                                view.coverage.job_area_m2,
                                view.sections_on_mask(),
                                ds.coverage_map.covered_area_m2()
                            );
                        }

                        ds.guid_core_output = Some(view);
                        ds.guid_core_status_rpt = report;
                    }
                    Err(TickError::Fix(e)) => {
                        ds.num_rejected_fixes += 1;
                        warn!("{}", e);
                    }
                    Err(e) => warn!("Error during GuidCore processing: {}", e),
                }

                // ---- WRITE ARCHIVES ----

                if let Err(e) = ds.guid_core.write() {
                    warn!("Could not write the GuidCore archive: {}", e);
                }
            }
            None => {
                ds.num_consec_missing_fixes += 1;

                if ds.num_consec_missing_fixes
                    == (MISSING_FIX_WARN_S * cycle_frequency_hz).ceil() as u64
                {
                    warn!("No fix received for {} s", MISSING_FIX_WARN_S);
                }
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    #[cfg(feature = "sim")]
    if let Some(ref mut c) = sim_client {
        c.stop();
    }

    ds.close_job();

    let summary = RunSummary {
        num_cycles: ds.num_cycles as u64,
        num_rejected_fixes: ds.num_rejected_fixes,
        num_skipped_fixes: fix_rx.num_skipped(),
        last_job_record: ds.last_job_record,
    };
    info!("Run summary: {:#?}", summary);
    session.save("run_summary.json", summary);
    info!("End of execution");

    session.exit();

    Ok(())
}

/// Read newline separated JSON fixes from stdin on a background thread.
fn spawn_stdin_parser(sender: FixSender) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin_parser".into())
        .spawn(move || {
            let stdin = io::stdin();

            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        warn!("Could not read from stdin: {}", e);
                        break;
                    }
                };

                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<RawFix>(&line) {
                    Ok(fix) => {
                        if sender.send(fix).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Could not parse fix: {}", e),
                }
            }

            debug!("Stdin fix parser finished");
        })
}
