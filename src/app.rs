use anyhow::{anyhow, Result};
use rustyline::DefaultEditor;

use crate::config::Config;
use crate::draft::EventDraft;
use crate::engine::{
    CancelRequest, ConfirmOutcome, ConfirmRequest, Engine, EngineServices, PrepareRequest,
    UpdateRequest,
};
use crate::error::EngineError;
use crate::intent::{EventMatchQuery, Intent};
use crate::services::{EventPatch, EventPayload};

pub struct Application;

impl Application {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> Result<()> {
        log::info!("Starting Carenda Terminal");
        let config = Config::load()?;

        // Start the API server in a background task
        let bind = format!("{}:{}", config.server.bind_address, config.server.port);
        log::info!("Starting API server on {}", bind);
        let server_engine = Engine::new(config.clone(), EngineServices::over_http(&config)?);
        let api_handle = tokio::spawn(async move {
            if let Err(e) = crate::api_server::start_api_server(server_engine, &bind).await {
                log::error!("API server error: {:?}", e);
            }
        });

        let engine = Engine::new(config.clone(), EngineServices::over_http(&config)?);
        let mut rl = DefaultEditor::new()?;
        let mut current_draft: Option<EventDraft> = None;

        println!("Bienvenue dans Carenda. Dictez un rendez-vous, ou 'aide' pour les commandes.");
        println!("Exemple: rendez-vous avec Jean Dupont demain à 14h pour 30 minutes");

        let prompt = "carenda> ";

        loop {
            match rl.readline(prompt) {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if matches!(line, "quitter" | "exit" | "quit") {
                        break;
                    }
                    if let Err(err) = self.process_input(&engine, line, &mut current_draft).await {
                        log::error!("Failed to process input: {:?}", err);
                        println!("❌ {}", err);
                    }
                }
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(rustyline::error::ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    break;
                }
            }
        }

        api_handle.abort();

        Ok(())
    }

    /// API-server-only mode, for deployments without a terminal.
    pub async fn run_server_only(&self) -> Result<()> {
        let config = Config::load()?;
        let bind = format!("{}:{}", config.server.bind_address, config.server.port);
        let engine = Engine::new(config.clone(), EngineServices::over_http(&config)?);
        crate::api_server::start_api_server(engine, &bind).await
    }

    async fn process_input(
        &self,
        engine: &Engine,
        input: &str,
        current_draft: &mut Option<EventDraft>,
    ) -> Result<()> {
        match input.split_whitespace().next() {
            Some("aide") | Some("help") => {
                print_help();
                Ok(())
            }
            Some("choisir") => self.choose_candidate(input, current_draft),
            Some("confirmer") => {
                let force = input.contains("--forcer") || input.contains("--force");
                self.confirm_current(engine, current_draft, force).await
            }
            _ => {
                // Anything else is dictation.
                let draft =
                    engine.prepare(PrepareRequest { text: input.to_string() }).await;
                println!("{}", draft.summary());
                if !draft.ambiguous_names().is_empty() {
                    println!("→ précisez avec: choisir <participant> <fiche>");
                }
                *current_draft = Some(draft);
                Ok(())
            }
        }
    }

    /// `choisir <participant> <fiche>`: pin an ambiguous mention to one of
    /// its listed candidates. Mutates the draft in place.
    fn choose_candidate(&self, input: &str, current_draft: &mut Option<EventDraft>) -> Result<()> {
        let draft = current_draft.as_mut().ok_or_else(|| anyhow!("aucun brouillon en cours"))?;

        let indexes: Vec<usize> = input
            .split_whitespace()
            .skip(1)
            .filter_map(|part| part.parse::<usize>().ok())
            .collect();
        let [participant_no, candidate_no] = indexes.as_slice() else {
            return Err(anyhow!("usage: choisir <numéro participant> <numéro fiche>"));
        };

        let participant = draft
            .participants
            .get_mut(participant_no.wrapping_sub(1))
            .ok_or_else(|| anyhow!("participant {} inconnu", participant_no))?;
        let candidate = participant
            .candidates
            .get(candidate_no.wrapping_sub(1))
            .cloned()
            .ok_or_else(|| anyhow!("fiche {} inconnue", candidate_no))?;

        participant.choose(&candidate);
        println!("→ {} associé à {}", participant.input_name, candidate.name);
        println!("{}", draft.summary());
        Ok(())
    }

    async fn confirm_current(
        &self,
        engine: &Engine,
        current_draft: &mut Option<EventDraft>,
        force: bool,
    ) -> Result<()> {
        let draft = current_draft.as_ref().ok_or_else(|| anyhow!("aucun brouillon en cours"))?;

        let (start, stop) = match (draft.start, draft.stop) {
            (Some(start), Some(stop)) => (start, stop),
            _ => return Err(anyhow!("la date doit être précisée avant confirmation")),
        };

        let outcome = match draft.intent {
            Intent::Create => {
                let title = if draft.description.is_empty() {
                    "Rendez-vous".to_string()
                } else {
                    draft.description.clone()
                };
                let request = ConfirmRequest {
                    event: EventPayload {
                        title,
                        start,
                        stop,
                        location: draft.location.clone(),
                        participant_ids: Vec::new(),
                    },
                    participants: draft.participants.clone(),
                    skip_availability_check: force,
                };
                match engine.confirm(request).await {
                    Ok(ConfirmOutcome::Committed { event_id, summary }) => {
                        println!("✅ {} (id {})", summary, event_id);
                        Ok(())
                    }
                    Ok(ConfirmOutcome::Conflict { suggestion }) => {
                        println!("⚠ {}", suggestion.message);
                        println!(
                            "  créneau proposé: le {} de {} à {}",
                            suggestion.final_start.format("%d/%m/%Y"),
                            suggestion.final_start.format("%H:%M"),
                            suggestion.final_stop.format("%H:%M")
                        );
                        println!("  redictez le créneau, ou 'confirmer --forcer' pour imposer");
                        // Draft stays live for the next decision.
                        return Ok(());
                    }
                    Err(e) => Err(e),
                }
            }
            Intent::Update => {
                // The dictated time identifies the visit to move; field-level
                // edits go through the HTTP surface.
                let request = UpdateRequest {
                    event_id: None,
                    query: Some(EventMatchQuery {
                        original_start: start,
                        participant_ids: draft.resolved_ids(),
                        keywords: None,
                    }),
                    fields: EventPatch { location: draft.location.clone(), ..Default::default() },
                };
                engine.update(request).await.map(|event_id| {
                    println!("✅ rendez-vous {} mis à jour", event_id);
                })
            }
            Intent::Cancel => {
                let request = CancelRequest {
                    event_id: None,
                    query: Some(EventMatchQuery {
                        original_start: start,
                        participant_ids: draft.resolved_ids(),
                        keywords: None,
                    }),
                };
                engine.cancel(request).await.map(|event_id| {
                    println!("✅ rendez-vous {} annulé", event_id);
                })
            }
        };

        match outcome {
            Ok(()) => {
                // Only a successful commit ends the draft's life; every
                // failure leaves it in place for correction or manual retry.
                *current_draft = None;
                Ok(())
            }
            Err(EngineError::EventNotFound) => Err(anyhow!(
                "aucun rendez-vous correspondant trouvé; précisez la date ou les participants"
            )),
            Err(EngineError::AmbiguousParticipant(name)) => {
                Err(anyhow!("participant \"{}\" à préciser avec 'choisir'", name))
            }
            Err(e) => Err(anyhow!(e)),
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

fn print_help() {
    println!("Commandes:");
    println!("  <dictée>                    - préparer un brouillon de rendez-vous");
    println!("  choisir <participant> <fiche> - lever une ambiguïté de participant");
    println!("  confirmer [--forcer]        - valider le brouillon courant");
    println!("  aide                        - afficher cette aide");
    println!("  quitter                     - quitter l'application");
}
