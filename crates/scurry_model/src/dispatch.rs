//! # Command Dispatcher
//!
//! Demultiplexes decoded frames by command code into typed model
//! mutations. Every command's payload is validated against its exact
//! shape contract (fixed length, `length % k == 0`, or `length > k`)
//! before the model is touched; a mismatch is a [`ProtocolError`] naming
//! the command and the session cannot safely continue.
//!
//! Most replies reserve their first payload byte as an error slot: zero
//! means success, recognized codes map to semantic [`Fault`]s through the
//! closed table in `scurry_protocol`, and an unrecognized code is fatal -
//! client and server disagree on the contract.

use std::sync::Arc;

use scurry_protocol::{
    decode, Ability, Character, Command, ProtocolError, ProtocolResult, RatingType, RawFrame,
    ServerError,
};

use crate::events::{Fault, FriendItem, RatingItem, StopCallReason};
use crate::field::CELL_COUNT;
use crate::model::{Model, Product, UserProfile};

/// Frame-to-model demultiplexer.
pub struct Dispatcher {
    model: Arc<Model>,
}

impl Dispatcher {
    /// Creates a dispatcher mutating `model`.
    #[must_use]
    pub fn new(model: Arc<Model>) -> Self {
        Self { model }
    }

    /// Decodes and dispatches one raw payload from the transport.
    ///
    /// # Errors
    ///
    /// Any [`ProtocolError`]: empty frame, unknown command, shape
    /// violation, or an error code outside the closed table.
    pub fn dispatch(&self, payload: &[u8]) -> ProtocolResult<()> {
        self.dispatch_frame(&decode(payload)?)
    }

    /// Dispatches one already-decoded frame (the emulator path).
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub fn dispatch_frame(&self, frame: &RawFrame) -> ProtocolResult<()> {
        let args = frame.args.as_slice();
        match frame.command {
            Command::SignIn | Command::SignUp => self.authorized(frame, true),
            Command::SignOut => self.authorized(frame, false),
            Command::UserInfo | Command::BuyProduct => self.user_info(frame),
            Command::Attack => self.attack(frame),
            Command::Call => self.call(frame),
            Command::StopCall => self.stop_call(frame),
            Command::FriendList => self.friend_list(frame),
            Command::AddFriend => self.add_friend(frame),
            Command::RemoveFriend => self.remove_friend(frame),
            Command::RangeOfProducts => self.range_of_products(frame),
            Command::RoundInfo => self.round_info(frame),
            Command::Rating => self.rating(frame),
            Command::FullState => self.full_state(frame),
            Command::StateChanged => self.state_changed(frame),
            Command::ScoreChanged => self.score_changed(frame),
            Command::PlayerWounded => self.player_wounded(frame),
            Command::Finished => self.finished(frame),
            Command::ThingTaken => self.thing_taken(frame),
            Command::ObjectAppended => self.object_appended(frame),
            Command::CheckPromocode => self.check_promocode(frame),
            Command::PromocodeDone => self.promocode_done(frame),
            Command::AbilityList => self.ability_list(frame),
            Command::Move => self.move_ack(frame),
            // Commands whose replies carry nothing but the error slot.
            Command::UnspecError
            | Command::Accept
            | Command::Reject
            | Command::CancelCall
            | Command::ReceiveTraining
            | Command::ChangeCharacter
            | Command::UseThing
            | Command::UseSkill
            | Command::GiveUp => match args.first() {
                Some(&code) => self.inspect_error(frame.command, code),
                None => Err(malformed(frame.command, "reply without error slot")),
            },
        }
    }

    /// Connectivity callback from the transport layer.
    pub fn connectivity_changed(&self, connected: bool) {
        self.model.set_connected(connected);
    }

    // =========================================================================

    fn authorized(&self, frame: &RawFrame, value: bool) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [0] => {
                self.model.set_authorized(value);
                Ok(())
            }
            [code] => self.inspect_error(frame.command, *code),
            _ => Err(malformed(frame.command, "expected a single status byte")),
        }
    }

    fn user_info(&self, frame: &RawFrame) -> ProtocolResult<()> {
        let Some((&code, rest)) = frame.args.split_first() else {
            return Err(malformed(frame.command, "missing error slot"));
        };
        if code != 0 {
            return self.inspect_error(frame.command, code);
        }
        let mut reader = scurry_protocol::FrameReader::new(frame.command, rest);
        let name = reader.read_str_nul();
        let promocode = reader.read_str_nul();
        let character = Character::from_u8(reader.read_u8()?).unwrap_or(Character::None);
        let crystals = reader.read_u32_be()?;
        let count = reader.read_u8()? as usize;
        let mut ability_expiry = Vec::with_capacity(count);
        for _ in 0..count {
            let id = reader.read_u8()?;
            let minutes = reader.read_u16_be()?;
            // Unknown ability ids are skipped, like unknown section codes.
            if let Some(ability) = Ability::from_u8(id) {
                ability_expiry.push((ability, minutes));
            }
        }
        self.model.apply_user_info(UserProfile {
            name,
            promocode,
            character,
            crystals,
            ability_expiry,
        });
        Ok(())
    }

    fn attack(&self, frame: &RawFrame) -> ProtocolResult<()> {
        let Some((&code, rest)) = frame.args.split_first() else {
            return Err(malformed(frame.command, "missing error slot"));
        };
        if code != 0 {
            return self.inspect_error(frame.command, code);
        }
        self.model.set_victim(&lossy(rest));
        Ok(())
    }

    fn call(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [code] => self.inspect_error(frame.command, *code),
            [hi, lo, name @ ..] if !name.is_empty() => {
                let sid = u16::from_be_bytes([*hi, *lo]);
                self.model.attacked(sid, &lossy(name));
                Ok(())
            }
            _ => Err(malformed(frame.command, "expected sid and aggressor name")),
        }
    }

    fn stop_call(&self, frame: &RawFrame) -> ProtocolResult<()> {
        let Some((&detail, name)) = frame.args.split_first() else {
            return Err(malformed(frame.command, "missing detail byte"));
        };
        let reason = match detail {
            0 => StopCallReason::Rejected,
            1 => StopCallReason::Missed,
            2 => StopCallReason::Expired,
            code => return self.inspect_error(frame.command, code),
        };
        self.model.stop_call(reason, &lossy(name));
        Ok(())
    }

    fn friend_list(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [code] => self.inspect_error(frame.command, *code),
            [0, fragment, items @ ..] => {
                let mut friends = Vec::new();
                // Items are `character byte + name`, NUL separated.
                for item in items.split(|&b| b == 0).filter(|i| !i.is_empty()) {
                    if let Some(character) = Character::from_u8(item[0]) {
                        friends.push(FriendItem {
                            character,
                            name: lossy(&item[1..]),
                        });
                    }
                }
                self.model.set_friend_list(friends, *fragment > 1);
                Ok(())
            }
            [code, ..] => self.inspect_error(frame.command, *code),
            [] => Err(malformed(frame.command, "missing error slot")),
        }
    }

    fn add_friend(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [0, character, name @ ..] => {
                if let Some(character) = Character::from_u8(*character) {
                    self.model.friend_added(FriendItem {
                        character,
                        name: lossy(name),
                    });
                }
                Ok(())
            }
            [0] => Err(malformed(frame.command, "missing friend payload")),
            [code, ..] => self.inspect_error(frame.command, *code),
            [] => Err(malformed(frame.command, "missing error slot")),
        }
    }

    fn remove_friend(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [0, name @ ..] => {
                self.model.friend_removed(&lossy(name));
                Ok(())
            }
            [code, ..] => self.inspect_error(frame.command, *code),
            [] => Err(malformed(frame.command, "missing error slot")),
        }
    }

    fn range_of_products(&self, frame: &RawFrame) -> ProtocolResult<()> {
        let args = frame.args.as_slice();
        if args.len() == 1 {
            return self.inspect_error(frame.command, args[0]);
        }
        if args.len() % 3 != 0 {
            return Err(malformed(frame.command, "catalogue is not whole triples"));
        }
        let products = args
            .chunks_exact(3)
            .filter_map(|t| {
                Ability::from_u8(t[0]).map(|ability| Product {
                    ability,
                    days: t[1],
                    cost: t[2],
                })
            })
            .collect();
        self.model.set_products(products);
        Ok(())
    }

    fn round_info(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [code] => self.inspect_error(frame.command, *code),
            [number, time_sec, aggressor, char1, char2, lives1, lives2, ..] => {
                self.model.set_round_info(
                    *number,
                    *time_sec,
                    *aggressor != 0,
                    Character::from_u8(*char1).unwrap_or(Character::None),
                    Character::from_u8(*char2).unwrap_or(Character::None),
                    *lives1,
                    *lives2,
                );
                Ok(())
            }
            _ => Err(malformed(frame.command, "round header shorter than 7 bytes")),
        }
    }

    fn rating(&self, frame: &RawFrame) -> ProtocolResult<()> {
        let args = frame.args.as_slice();
        match args {
            [code] => self.inspect_error(frame.command, *code),
            [code, kind, rows @ ..] => {
                let (0, Some(kind)) = (*code, RatingType::from_u8(*kind)) else {
                    return self.inspect_error(frame.command, *code);
                };
                let mut reader = scurry_protocol::FrameReader::new(frame.command, rows);
                let mut items = Vec::new();
                while reader.remaining() > 0 {
                    let name = reader.read_str_nul();
                    let wins = reader.read_u32_be()?;
                    let losses = reader.read_u32_be()?;
                    let score_diff = reader.read_u32_be()?;
                    items.push(RatingItem {
                        name,
                        wins,
                        losses,
                        score_diff,
                    });
                }
                self.model.set_rating(kind, items);
                Ok(())
            }
            [] => Err(malformed(frame.command, "missing error slot")),
        }
    }

    /// Composite frame: the whole grid, then typed `{code, len, payload}`
    /// sections. Unknown section codes are skipped so newer servers can
    /// append sections without breaking older clients; known ones are
    /// applied.
    fn full_state(&self, frame: &RawFrame) -> ProtocolResult<()> {
        let args = frame.args.as_slice();
        if args.len() == 1 {
            return self.inspect_error(frame.command, args[0]);
        }
        if args.len() < CELL_COUNT {
            return Err(malformed(frame.command, "grid shorter than the field"));
        }
        self.model.set_new_field(&args[..CELL_COUNT]);

        let mut at = CELL_COUNT;
        while at + 1 < args.len() {
            let section = args[at];
            let len = args[at + 1] as usize;
            let payload = args
                .get(at + 2..at + 2 + len)
                .ok_or_else(|| malformed(frame.command, "section overruns frame"))?;
            match section {
                1 => {
                    // Extra level objects: (number, id, xy) triples.
                    if len % 3 != 0 {
                        return Err(malformed(frame.command, "extras are not whole triples"));
                    }
                    for triple in payload.chunks_exact(3) {
                        self.model.append_object(triple[0], triple[1], triple[2]);
                    }
                }
                2 => {
                    if len != 1 {
                        return Err(malformed(frame.command, "style pack is a single byte"));
                    }
                    self.model.set_style_pack(payload[0]);
                }
                _ => {} // forward-compatible: skip
            }
            at += 2 + len;
        }
        Ok(())
    }

    fn state_changed(&self, frame: &RawFrame) -> ProtocolResult<()> {
        let args = frame.args.as_slice();
        if args.len() == 1 {
            return self.inspect_error(frame.command, args[0]);
        }
        if args.len() % 2 != 0 {
            return Err(malformed(frame.command, "relocations are not whole pairs"));
        }
        for pair in args.chunks_exact(2) {
            self.model.set_xy(pair[0], pair[1]);
        }
        Ok(())
    }

    fn score_changed(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [score1, score2] => {
                self.model.set_score(*score1, *score2);
                Ok(())
            }
            [code] => self.inspect_error(frame.command, *code),
            _ => Err(malformed(frame.command, "expected two score bytes")),
        }
    }

    fn player_wounded(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [lives1, lives2] => {
                self.model.set_lives(*lives1, *lives2);
                Ok(())
            }
            [code] => self.inspect_error(frame.command, *code),
            _ => Err(malformed(frame.command, "expected two lives bytes")),
        }
    }

    fn finished(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [code] => self.inspect_error(frame.command, *code),
            [1, winner, ..] => {
                self.model.game_finished(*winner > 0);
                Ok(())
            }
            [0, winner, score1, score2] => {
                self.model.round_finished(*winner > 0, *score1, *score2);
                Ok(())
            }
            [0, ..] => Err(malformed(frame.command, "round result needs both totals")),
            [code, ..] => self.inspect_error(frame.command, *code),
            [] => Err(malformed(frame.command, "missing finish kind")),
        }
    }

    fn thing_taken(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [mine, thing_id] => {
                if *mine != 0 {
                    self.model.set_thing(*thing_id);
                } else {
                    self.model.set_enemy_thing(*thing_id);
                }
                Ok(())
            }
            [code] => self.inspect_error(frame.command, *code),
            _ => Err(malformed(frame.command, "expected owner and thing id")),
        }
    }

    fn object_appended(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [id, number, xy] => {
                self.model.append_object(*number, *id, *xy);
                Ok(())
            }
            [code] => self.inspect_error(frame.command, *code),
            _ => Err(malformed(frame.command, "expected id, number and xy")),
        }
    }

    fn check_promocode(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [verdict @ (0 | 1)] => {
                self.model.set_promocode_valid(*verdict == 1);
                Ok(())
            }
            [code] => self.inspect_error(frame.command, *code),
            _ => Err(malformed(frame.command, "expected a single verdict byte")),
        }
    }

    fn promocode_done(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [code] => self.inspect_error(frame.command, *code),
            [inviter, crystals, name @ ..] => {
                self.model
                    .promocode_done(&lossy(name), *inviter == 1, *crystals);
                Ok(())
            }
            [] => Err(malformed(frame.command, "missing payout payload")),
        }
    }

    fn ability_list(&self, frame: &RawFrame) -> ProtocolResult<()> {
        let Some((&count, ids)) = frame.args.split_first() else {
            return Err(malformed(frame.command, "missing ability count"));
        };
        if ids.len() != count as usize {
            return Err(malformed(frame.command, "ability count mismatch"));
        }
        let abilities = ids.iter().filter_map(|&id| Ability::from_u8(id)).collect();
        self.model.set_abilities(abilities);
        Ok(())
    }

    fn move_ack(&self, frame: &RawFrame) -> ProtocolResult<()> {
        match frame.args.as_slice() {
            [0] => {
                self.model.move_ack();
                Ok(())
            }
            [code] => self.inspect_error(frame.command, *code),
            _ => Err(malformed(frame.command, "expected a single status byte")),
        }
    }

    /// Maps a numeric server error code to its model-level outcome.
    /// A stale session (restarted server or client) silently re-signs-in
    /// with the stored credentials instead of surfacing a fault.
    fn inspect_error(&self, command: Command, code: u8) -> ProtocolResult<()> {
        if code == 0 {
            return Ok(());
        }
        let Some(error) = ServerError::from_code(code) else {
            return Err(ProtocolError::UnknownErrorCode { command, code });
        };
        tracing::debug!(?command, ?error, "server reported error");
        match error {
            ServerError::IncorrectPassword | ServerError::IncorrectLogin => {
                self.model.fault(Fault::IncorrectCredentials);
            }
            ServerError::AttackYourself => self.model.fault(Fault::AttackYourself),
            ServerError::AggressorBusy => self.model.fault(Fault::AggressorBusy),
            ServerError::DefenderBusy => self.model.fault(Fault::DefenderBusy),
            ServerError::BattleNotFound => self.model.fault(Fault::BattleNotFound),
            ServerError::SignUpRejected => self.model.fault(Fault::SignUpRejected),
            ServerError::NoCrystals => self.model.fault(Fault::NoCrystals),
            ServerError::AddFriendRejected => self.model.fault(Fault::AddFriendRejected),
            ServerError::UserNotFound | ServerError::IncorrectToken => {
                self.model.sign_in_stored();
            }
            ServerError::EnemyNotFound => self.model.fault(Fault::EnemyNotFound),
            ServerError::NoFreeUsers => self.model.fault(Fault::NoFreeUsers),
            ServerError::IncorrectName => self.model.fault(Fault::IncorrectName),
            ServerError::IncorrectEmail => self.model.fault(Fault::IncorrectEmail),
            ServerError::DuplicateName => self.model.fault(Fault::DuplicateName),
        }
        Ok(())
    }
}

fn malformed(command: Command, reason: &'static str) -> ProtocolError {
    ProtocolError::MalformedFrame { command, reason }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::ObjectKind;
    use crate::events::{EventReceiver, ModelEvent};
    use crate::model::CommandSender;
    use crate::store::MemoryStore;
    use crate::EventBus;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(Command, Vec<u8>)>>,
    }

    impl CommandSender for RecordingSender {
        fn send(&self, command: Command, args: &[u8]) {
            self.sent.lock().push((command, args.to_vec()));
        }
        fn reset(&self) {}
    }

    fn harness() -> (Dispatcher, Arc<Model>, Arc<RecordingSender>, EventReceiver) {
        let (events, receiver) = EventBus::create_pair(64);
        let model = Arc::new(Model::new(events));
        let sender = Arc::new(RecordingSender::default());
        model.set_sender(Arc::clone(&sender) as Arc<dyn CommandSender>);
        model.set_store(Arc::new(MemoryStore::new()));
        let dispatcher = Dispatcher::new(Arc::clone(&model));
        (dispatcher, model, sender, receiver)
    }

    fn frame(command: Command, args: &[u8]) -> RawFrame {
        RawFrame::new(command, args.to_vec())
    }

    #[test]
    fn test_invite_round_trip_scenario() {
        let (dispatcher, model, _sender, rx) = harness();

        // The server echoes our invitation: no error, then the name.
        dispatcher
            .dispatch(&[Command::Attack as u8, 0x00, b'B', b'o', b'b', b'b', b'y'])
            .unwrap();
        assert_eq!(model.enemy(), "Bobby");
        assert_eq!(
            rx.drain(),
            vec![ModelEvent::InviteSent {
                victim: "Bobby".into()
            }]
        );

        // The peer calls back: session id 300, name "Alice".
        dispatcher
            .dispatch_frame(&frame(
                Command::Call,
                &[0x01, 0x2C, b'A', b'l', b'i', b'c', b'e'],
            ))
            .unwrap();
        assert_eq!(
            rx.drain(),
            vec![ModelEvent::Invite {
                enemy: "Alice".into(),
                enemy_sid: 300
            }]
        );
    }

    #[test]
    fn test_short_full_state_is_malformed() {
        let (dispatcher, _model, _sender, _rx) = harness();
        let err = dispatcher
            .dispatch_frame(&frame(Command::FullState, &vec![0u8; CELL_COUNT - 1]))
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedFrame {
                command: Command::FullState,
                ..
            }
        ));
    }

    #[test]
    fn test_full_state_skips_unknown_sections_applies_known() {
        let (dispatcher, model, _sender, rx) = harness();
        let mut args = vec![0u8; CELL_COUNT];
        args[10] = ObjectKind::Actor1 as u8;
        // Unknown section 9, then extras (one apple), then style pack.
        args.extend_from_slice(&[9, 2, 0xAA, 0xBB]);
        args.extend_from_slice(&[1, 3, 40, ObjectKind::Apple as u8, 20]);
        args.extend_from_slice(&[2, 1, 3]);
        dispatcher
            .dispatch_frame(&frame(Command::FullState, &args))
            .unwrap();

        let field = model.field_snapshot().expect("field installed");
        assert_eq!(field.object(40).unwrap().kind, ObjectKind::Apple);
        assert_eq!(model.style_pack(), 3);
        assert!(rx
            .drain()
            .contains(&ModelEvent::StyleChanged { pack: 3 }));
        // Our actor got bound from the grid.
        assert_eq!(model.cur_actor().unwrap().xy, 10);
    }

    #[test]
    fn test_full_state_section_overrun_is_malformed() {
        let (dispatcher, _model, _sender, _rx) = harness();
        let mut args = vec![0u8; CELL_COUNT];
        args.extend_from_slice(&[1, 6, 40, 4]); // claims 6 payload bytes, has 2
        let err = dispatcher
            .dispatch_frame(&frame(Command::FullState, &args))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { .. }));
    }

    #[test]
    fn test_state_changed_applies_pairs_and_rejects_odd() {
        let (dispatcher, model, _sender, _rx) = harness();
        let mut grid = vec![0u8; CELL_COUNT];
        grid[5] = ObjectKind::Actor1 as u8;
        dispatcher
            .dispatch_frame(&frame(Command::FullState, &grid))
            .unwrap();

        dispatcher
            .dispatch_frame(&frame(Command::StateChanged, &[1, 9]))
            .unwrap();
        assert_eq!(model.cur_actor().unwrap().xy, 9);

        let err = dispatcher
            .dispatch_frame(&frame(Command::StateChanged, &[1, 9, 2]))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { .. }));
    }

    #[test]
    fn test_finished_splits_round_and_game() {
        let (dispatcher, model, _sender, rx) = harness();
        dispatcher
            .dispatch_frame(&frame(Command::Finished, &[0, 1, 2, 1]))
            .unwrap();
        assert_eq!(model.total_scores(), (2, 1));
        assert_eq!(rx.drain(), vec![ModelEvent::RoundFinished { winner: true }]);

        dispatcher
            .dispatch_frame(&frame(Command::Finished, &[1, 0, 2, 1]))
            .unwrap();
        assert_eq!(rx.drain(), vec![ModelEvent::GameFinished { winner: false }]);
        assert!(model.field_snapshot().is_none());

        // A round result missing its totals violates the contract.
        let err = dispatcher
            .dispatch_frame(&frame(Command::Finished, &[0, 1]))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { .. }));
    }

    #[test]
    fn test_user_info_walk() {
        let (dispatcher, model, _sender, rx) = harness();
        let mut args = vec![0u8]; // no error
        args.extend_from_slice(b"Bobby\0PROMO7\0");
        args.push(Character::Hedgehog as u8);
        args.extend_from_slice(&1000u32.to_be_bytes());
        args.push(2); // two abilities
        args.extend_from_slice(&[Ability::Snorkel as u8, 0x00, 0x3C]);
        args.extend_from_slice(&[Ability::Miner as u8, 0x01, 0x00]);
        dispatcher
            .dispatch_frame(&frame(Command::UserInfo, &args))
            .unwrap();

        assert_eq!(model.name(), "Bobby");
        assert_eq!(model.promocode(), "PROMO7");
        assert_eq!(model.character(), Character::Hedgehog);
        assert_eq!(model.crystals(), 1000);
        assert_eq!(
            model.ability_expiry(),
            vec![(Ability::Snorkel, 60), (Ability::Miner, 256)]
        );
        assert!(rx.drain().contains(&ModelEvent::CharacterChanged {
            character: Character::Hedgehog
        }));
    }

    #[test]
    fn test_user_info_truncated_is_malformed() {
        let (dispatcher, _model, _sender, _rx) = harness();
        // Claims one ability triple but the frame ends early.
        let mut args = vec![0u8];
        args.extend_from_slice(b"Bobby\0\0");
        args.push(Character::Rabbit as u8);
        args.extend_from_slice(&0u32.to_be_bytes());
        args.push(1);
        args.push(Ability::Snorkel as u8);
        let err = dispatcher
            .dispatch_frame(&frame(Command::UserInfo, &args))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { .. }));
    }

    #[test]
    fn test_friend_list_fragments() {
        let (dispatcher, model, _sender, _rx) = harness();
        dispatcher
            .dispatch_frame(&frame(Command::FriendList, &[0, 1, 3, b'T', b'o', b'm', 0]))
            .unwrap();
        dispatcher
            .dispatch_frame(&frame(Command::FriendList, &[0, 2, 2, b'B', b'o', b'b', 0]))
            .unwrap();
        let friends = model.friends();
        assert_eq!(friends.len(), 2);
        assert_eq!(friends[0].name, "Tom");
        assert_eq!(friends[0].character, Character::Squirrel);
        assert_eq!(friends[1].name, "Bob");
    }

    #[test]
    fn test_known_error_code_maps_to_fault() {
        let (dispatcher, _model, _sender, rx) = harness();
        dispatcher
            .dispatch_frame(&frame(Command::Attack, &[247]))
            .unwrap();
        assert_eq!(
            rx.drain(),
            vec![ModelEvent::Fault {
                fault: Fault::EnemyNotFound
            }]
        );
    }

    #[test]
    fn test_unknown_error_code_is_fatal() {
        let (dispatcher, _model, _sender, _rx) = harness();
        let err = dispatcher
            .dispatch_frame(&frame(Command::Attack, &[99]))
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnknownErrorCode {
                command: Command::Attack,
                code: 99
            }
        );
    }

    #[test]
    fn test_stale_session_triggers_resign_in() {
        let (dispatcher, model, sender, _rx) = harness();
        model.sign_in("Bobby", "secret");
        sender.sent.lock().clear();
        // Server restarted: code 245 on an ordinary reply.
        dispatcher
            .dispatch_frame(&frame(Command::UserInfo, &[245]))
            .unwrap();
        assert_eq!(sender.sent.lock()[0].0, Command::SignIn);
    }

    #[test]
    fn test_ability_list_count_contract() {
        let (dispatcher, model, _sender, _rx) = harness();
        dispatcher
            .dispatch_frame(&frame(
                Command::AbilityList,
                &[2, Ability::Snorkel as u8, Ability::Miner as u8],
            ))
            .unwrap();
        assert_eq!(model.abilities(), vec![Ability::Snorkel, Ability::Miner]);

        let err = dispatcher
            .dispatch_frame(&frame(Command::AbilityList, &[3, 1]))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { .. }));
    }

    #[test]
    fn test_empty_and_unknown_frames_fail() {
        let (dispatcher, _model, _sender, _rx) = harness();
        assert_eq!(dispatcher.dispatch(&[]), Err(ProtocolError::EmptyFrame));
        assert_eq!(
            dispatcher.dispatch(&[0xEE, 1]),
            Err(ProtocolError::UnknownCommand { code: 0xEE })
        );
    }

    #[test]
    fn test_thing_taken_owner_split() {
        let (dispatcher, model, _sender, rx) = harness();
        dispatcher
            .dispatch_frame(&frame(
                Command::ThingTaken,
                &[1, ObjectKind::Umbrella as u8],
            ))
            .unwrap();
        assert_eq!(model.cur_thing(), Some(ObjectKind::Umbrella));
        dispatcher
            .dispatch_frame(&frame(Command::ThingTaken, &[0, ObjectKind::Mine as u8]))
            .unwrap();
        assert_eq!(model.enemy_thing(), Some(ObjectKind::Mine));
        let events = rx.drain();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_rating_walk() {
        let (dispatcher, _model, _sender, rx) = harness();
        let mut args = vec![0u8, RatingType::Weekly as u8];
        args.extend_from_slice(b"Ann\0");
        args.extend_from_slice(&7u32.to_be_bytes());
        args.extend_from_slice(&2u32.to_be_bytes());
        args.extend_from_slice(&15u32.to_be_bytes());
        dispatcher
            .dispatch_frame(&frame(Command::Rating, &args))
            .unwrap();
        assert_eq!(
            rx.drain(),
            vec![ModelEvent::RatingUpdated {
                kind: RatingType::Weekly,
                items: vec![RatingItem {
                    name: "Ann".into(),
                    wins: 7,
                    losses: 2,
                    score_diff: 15
                }]
            }]
        );
    }
}
