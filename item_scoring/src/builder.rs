pub use crate::config::*;

/// A builder for collecting the inputs of a scoring run.
///
/// ```
/// pub use item_scoring::builder::Builder;
/// pub use item_scoring::{Participant, ScoringRules};
/// # use item_scoring::ScoringErrors;
///
/// let mut builder = Builder::new(&ScoringRules::DEFAULT_RULES)?
///     .likert_items("EXT", &["E1".to_string(), "E2".to_string()], 1.0, 5.0)?;
///
/// builder.add_answers_simple("r1", &["4".to_string(), "5".to_string()])?;
/// builder.add_answers_simple("r2", &["2".to_string(), "1".to_string()])?;
/// // A consenting participant who did not answer still gets a row.
/// builder.add_participant(&Participant {
///     respondent_id: "r3".to_string(),
///     consent: true,
///     cohort: None,
///     started_at: None,
/// })?;
///
/// let out = builder.run()?;
/// assert_eq!(out.wide_scored.rows.len(), 3);
/// assert_eq!(out.wide_scored.get("r3", "E1"), None);
///
/// # Ok::<(), ScoringErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: ScoringRules,
    pub(crate) _items: Vec<Item>,
    pub(crate) _participants: Vec<Participant>,
    pub(crate) _responses: Vec<Response>,
}

impl Builder {
    pub fn new(rules: &ScoringRules) -> Result<Builder, ScoringErrors> {
        Ok(Builder {
            _rules: rules.clone(),
            _items: Vec::new(),
            _participants: Vec::new(),
            _responses: Vec::new(),
        })
    }

    /// Declares the items of a Likert scale, all with the same bounds and none reverse-scored.
    pub fn likert_items(
        mut self,
        scale_id: &str,
        item_ids: &[String],
        min: f64,
        max: f64,
    ) -> Result<Builder, ScoringErrors> {
        for item_id in item_ids {
            self.add_item(&Item::likert(item_id, scale_id, min, max, false))?;
        }
        Ok(self)
    }

    pub fn add_item(&mut self, item: &Item) -> Result<(), ScoringErrors> {
        if self._items.iter().any(|i| i.item_id == item.item_id) {
            return Err(ScoringErrors::DuplicateItem(item.item_id.clone()));
        }
        self._items.push(item.clone());
        Ok(())
    }

    pub fn add_participant(&mut self, participant: &Participant) -> Result<(), ScoringErrors> {
        if self
            ._participants
            .iter()
            .any(|p| p.respondent_id == participant.respondent_id)
        {
            return Err(ScoringErrors::DuplicateParticipant(
                participant.respondent_id.clone(),
            ));
        }
        self._participants.push(participant.clone());
        Ok(())
    }

    /// Adds the answers of a respondent, in the order the items were declared.
    ///
    /// Empty strings are recorded as missing answers.
    pub fn add_answers_simple(
        &mut self,
        respondent_id: &str,
        answers: &[String],
    ) -> Result<(), ScoringErrors> {
        let item_ids: Vec<String> = self._items.iter().map(|i| i.item_id.clone()).collect();
        for (item_id, answer) in item_ids.iter().zip(answers.iter()) {
            let mut r = Response::simple(respondent_id, item_id, answer);
            if answer.is_empty() {
                r.response = None;
            }
            self.add_response(&r)?;
        }
        Ok(())
    }

    pub fn add_response(&mut self, response: &Response) -> Result<(), ScoringErrors> {
        self._responses.push(response.clone());
        Ok(())
    }

    pub fn run(&self) -> Result<ScoredOutput, ScoringErrors> {
        crate::clean_and_score(
            &self._responses,
            &self._participants,
            &self._items,
            &self._rules,
        )
    }
}
