//! Two-step weight/volume capture that precedes a delivery.
//!
//! The presentation layer asks whatever [`DeliveryCapture::prompt`] returns
//! and feeds the reply back with [`DeliveryCapture::answer`]. Cancelling the
//! weight ends the capture; volume is only asked for once a weight is known.

use serde::Serialize;
use shipment_tracker_core::{parse_measurement, EditableField, TrackerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPrompt {
    Weight,
    Volume,
}

impl DeliveryPrompt {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Weight => "Item weight",
            Self::Volume => "Item volume",
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Weight => "Enter the item weight in kg:",
            Self::Volume => "Enter the item volume in m³:",
        }
    }

    #[must_use]
    pub fn field(self) -> EditableField {
        match self {
            Self::Weight => EditableField::WeightKg,
            Self::Volume => EditableField::VolumeM3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryCapture {
    weight_kg: Option<f64>,
    volume_m3: Option<f64>,
    pending: Option<DeliveryPrompt>,
}

impl DeliveryCapture {
    #[must_use]
    pub fn new() -> Self {
        Self { weight_kg: None, volume_m3: None, pending: Some(DeliveryPrompt::Weight) }
    }

    /// Run the protocol with answers known up front, as a one-shot command does.
    #[must_use]
    pub fn from_answers(weight_kg: Option<f64>, volume_m3: Option<f64>) -> Self {
        let mut capture = Self::new();
        capture.answer(weight_kg);
        capture.answer(volume_m3);
        capture
    }

    #[must_use]
    pub fn prompt(&self) -> Option<DeliveryPrompt> {
        self.pending
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_none()
    }

    /// Record the reply to the current prompt; `None` means the prompt was cancelled.
    pub fn answer(&mut self, value: Option<f64>) {
        self.pending = match (self.pending, value) {
            (Some(DeliveryPrompt::Weight), Some(weight)) => {
                self.weight_kg = Some(weight);
                Some(DeliveryPrompt::Volume)
            }
            (Some(DeliveryPrompt::Volume), volume) => {
                self.volume_m3 = volume;
                None
            }
            (Some(DeliveryPrompt::Weight) | None, _) => None,
        };
    }

    /// Parse a typed reply; blank text cancels the current prompt.
    ///
    /// # Errors
    /// Returns [`TrackerError::InvalidField`] for text that is not a finite,
    /// non-negative number. The prompt stays pending so it can be asked again.
    pub fn answer_text(&mut self, text: &str) -> Result<(), TrackerError> {
        let Some(prompt) = self.pending else {
            return Ok(());
        };
        let value = parse_measurement(prompt.field(), text)?;
        self.answer(value);
        Ok(())
    }

    /// Captured `(weight_kg, volume_m3)`, ready for `mark_delivered`.
    #[must_use]
    pub fn finish(self) -> (Option<f64>, Option<f64>) {
        (self.weight_kg, self.volume_m3)
    }
}

impl Default for DeliveryCapture {
    fn default() -> Self {
        Self::new()
    }
}
