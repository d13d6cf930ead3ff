//! Calibration run for the BCI classifiers: baseline, motor imagery and
//! blink detection, each phase enabled independently.

use crate::balanced::BalancedSequence;
use crate::config::TrainingConfig;
use crate::Context;
use cadence_core::{Element, MediaKind, Phase, Result, TrainingPhase};
use cadence_timing::{Scheduler, Timer};
use rand::Rng;
use serde_json::json;

pub struct Training<T: Timer, R: Rng> {
    config: TrainingConfig,
    /// Per imagery class, when media cues are configured
    media: Option<Vec<MediaKind>>,
    ctx: Context<T>,
    rng: R,
    scheduler: Scheduler,
    phase: Option<TrainingPhase>,
}

impl<T, R> Training<T, R>
where
    T: Timer,
    R: Rng + Send,
{
    /// Validates `config` and registers media cues with the surface
    pub fn new(config: TrainingConfig, ctx: Context<T>, rng: R) -> Result<Self> {
        config.validate()?;
        let media = config.motor.media.as_ref().map(|list| {
            let mut surface = ctx.surface.lock();
            list.iter()
                .enumerate()
                .filter_map(|(index, media)| {
                    let kind = media.kind()?;
                    surface.load_media(index, kind, &media.path);
                    Some(kind)
                })
                .collect()
        });
        Ok(Self {
            scheduler: ctx.scheduler(),
            config,
            media,
            ctx,
            rng,
            phase: None,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Phase currently running, if any
    pub fn phase(&self) -> Option<TrainingPhase> {
        self.phase
    }

    pub async fn run(&mut self) -> Result<()> {
        self.scheduler.start();
        self.ctx
            .emit("training_begins", Some(serde_json::to_value(&self.config)?));

        let result = self.phases().await;

        self.phase = None;
        self.scheduler.stop();
        result?;
        self.ctx.emit("training_ends", None);
        tracing::info!("training finished");
        Ok(())
    }

    async fn phases(&mut self) -> Result<()> {
        let mut next = Some(TrainingPhase::default());
        while let Some(phase) = next {
            if self.config.enabled(phase) {
                tracing::info!(phase = phase.name(), "training phase");
                self.phase = Some(phase);
                match phase {
                    TrainingPhase::Baseline => self.baseline().await?,
                    TrainingPhase::Motor => self.motor().await?,
                    TrainingPhase::Blink => self.blink().await?,
                }
            }
            next = phase.next();
        }
        Ok(())
    }

    /// Shows the instruction with the ready prompt until any key
    async fn prompt(&self, instruction: &str) -> Result<()> {
        {
            let mut surface = self.ctx.surface.lock();
            surface.set_text(Element::Message, instruction);
            surface.show(Element::Ready);
        }
        self.ctx.input.wait_for_key(None).await?;
        let mut surface = self.ctx.surface.lock();
        surface.set_text(Element::Message, "");
        surface.hide(Element::Ready);
        Ok(())
    }

    fn emit_phase(&self, suffix: &str) {
        if let Some(phase) = self.phase {
            self.ctx.emit(&format!("{}_{suffix}", phase.name()), None);
        }
    }

    async fn baseline(&mut self) -> Result<()> {
        let baseline = self.config.baseline.clone();
        if baseline.duration == 0 {
            return Ok(());
        }
        self.prompt(&baseline.instruction).await?;
        self.ctx.surface.lock().show(Element::Marker);
        self.emit_phase("begins");
        self.ctx.sleep_ms(baseline.duration).await;
        self.emit_phase("ends");
        self.ctx.surface.lock().hide(Element::Marker);
        Ok(())
    }

    async fn motor(&mut self) -> Result<()> {
        let motor = self.config.motor.clone();
        self.prompt(&motor.instruction).await?;
        self.emit_phase("begins");
        self.ctx.surface.lock().show(Element::Marker);
        self.ctx.sleep_ms(motor.duration.prep).await;
        self.ctx.surface.lock().hide(Element::Marker);

        for block in 0..motor.blocks {
            self.ctx.emit("block_begins", None);
            let mut trials =
                BalancedSequence::new(motor.imagery.len(), motor.trials, &mut self.rng)?;
            for _ in 0..motor.trials {
                let id = trials.next()?;
                let message = motor.imagery[id].clone();
                let media = self.media.as_ref().and_then(|kinds| kinds.get(id).copied());

                if let Some(kind) = media {
                    {
                        let mut surface = self.ctx.surface.lock();
                        if kind == MediaKind::Video {
                            surface.rewind(id);
                        }
                        surface.show(Element::Media(id));
                    }
                    self.ctx.sleep_ms(motor.duration.pause).await;
                }

                self.scheduler
                    .asap({
                        let ctx = self.ctx.clone();
                        move || {
                            match media {
                                Some(MediaKind::Video) => ctx.surface.lock().play(id),
                                Some(MediaKind::Image) => {}
                                None => ctx.surface.lock().set_text(Element::Message, &message),
                            }
                            ctx.emit("trial_begins", Some(json!({ "id": id, "message": message })));
                        }
                    })
                    .await?;
                self.ctx.sleep_ms(motor.duration.on).await;
                self.scheduler
                    .asap({
                        let ctx = self.ctx.clone();
                        move || {
                            match media {
                                Some(_) => ctx.surface.lock().hide(Element::Media(id)),
                                None => ctx.surface.lock().set_text(Element::Message, ""),
                            }
                            ctx.emit("trial_ends", None);
                        }
                    })
                    .await?;
                self.ctx.sleep_ms(motor.duration.off).await;
            }
            self.ctx.emit("block_ends", None);

            if block + 1 < motor.blocks {
                self.ctx.surface.lock().show(Element::Marker);
                self.ctx.sleep_ms(motor.duration.rest).await;
                self.ctx.surface.lock().hide(Element::Marker);
            }
        }
        self.emit_phase("ends");
        Ok(())
    }

    async fn blink(&mut self) -> Result<()> {
        let blink = self.config.blink.clone();
        let d = &blink.duration;
        self.prompt(&blink.instruction).await?;
        self.ctx.surface.lock().show(Element::Marker);
        self.emit_phase("begins");
        self.ctx.sleep_ms(d.prep).await;

        for _ in 0..blink.trials {
            self.ctx.emit("trial_begins", None);
            self.scheduler
                .asap({
                    let ctx = self.ctx.clone();
                    move || {
                        {
                            let mut surface = ctx.surface.lock();
                            surface.hide(Element::Marker);
                            surface.show(Element::Dot);
                        }
                        ctx.emit("stim", Some(json!({ "status": true })));
                    }
                })
                .await?;
            self.ctx.sleep_ms(d.display).await;
            {
                let mut surface = self.ctx.surface.lock();
                surface.hide(Element::Dot);
                surface.show(Element::Marker);
            }
            self.ctx
                .timer
                .sleep_ms(d.stim as i64 - d.display as i64)
                .await;
            self.ctx.emit("stim", Some(json!({ "status": false })));
            self.ctx.sleep_ms(d.display).await;
            let rest = self.rng.random_range(d.rest_min..=d.rest_max);
            self.ctx.sleep_ms(rest).await;
            self.ctx.emit("trial_ends", None);
        }

        self.ctx.surface.lock().hide(Element::Marker);
        self.emit_phase("ends");
        Ok(())
    }
}
