//! # Application Model
//!
//! The session and game state in one explicit context object, injected
//! into the transport and the dispatcher instead of living in globals.
//!
//! Mutation discipline: only the dispatcher and the battle engine call the
//! setter half of this API, always from the network/engine thread; the UI
//! reads concurrently from its own loop. Cross-thread scalars are atomics
//! with acquire/release ordering, strings and collections sit behind locks
//! and are handed out as snapshots, so observers never iterate a structure
//! that is being mutated under them.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use scurry_protocol::{Ability, Character, Command, FrameWriter, MoveDirection, RatingType};

use crate::cells::ObjectKind;
use crate::events::{
    EventSender, Fault, FriendItem, ModelEvent, RatingItem, StopCallReason,
};
use crate::field::{CellObject, Field, WIDTH};
use crate::store::{FileStore, HistoryFile, HistoryItem, Settings};

/// Most history entries kept per user.
pub const HISTORY_MAX: usize = 32;

/// Shortest promo code the server accepts.
pub const PROMOCODE_MIN_LEN: usize = 5;

/// Keep-alive period; the server signs inactive sessions out.
pub const PING_PERIOD: Duration = Duration::from_secs(60);

/// One purchasable ability package from the server catalogue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Product {
    /// The ability on sale.
    pub ability: Ability,
    /// Rental length in days.
    pub days: u8,
    /// Price in crystals.
    pub cost: u8,
}

/// Decoded `UserInfo` reply payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    /// Our user name as the server knows it.
    pub name: String,
    /// Our personal promo code.
    pub promocode: String,
    /// Our chosen character.
    pub character: Character,
    /// Crystal balance.
    pub crystals: u32,
    /// Paid abilities with minutes left.
    pub ability_expiry: Vec<(Ability, u16)>,
}

/// Outbound seam: where the model's requests go. Online this is the
/// reliable transport; in training mode it is the battle emulator.
pub trait CommandSender: Send + Sync {
    /// Ships one request frame.
    fn send(&self, command: Command, args: &[u8]);

    /// Drops the session identity before re-authentication.
    fn reset(&self);
}

/// The application model. One instance per client, shared via `Arc`.
pub struct Model {
    // identity
    name: RwLock<String>,
    hash: RwLock<String>,
    enemy: RwLock<String>,
    promocode: RwLock<String>,
    character: AtomicU8,
    connected: AtomicBool,
    authorized: AtomicBool,
    promocode_valid: AtomicBool,
    newbie: AtomicBool,
    crystals: AtomicU32,
    single_player_progress: AtomicU32,

    // current battle view
    aggressor: AtomicBool,
    character1: AtomicU8,
    character2: AtomicU8,
    total_score1: AtomicU8,
    total_score2: AtomicU8,
    round_number: AtomicU8,
    round_length_sec: AtomicU8,
    style_pack: AtomicU8,
    field: Mutex<Option<Field>>,
    cur_actor: Mutex<Option<u8>>,
    cur_thing: Mutex<Option<ObjectKind>>,
    enemy_thing: Mutex<Option<ObjectKind>>,

    // collections
    products: Mutex<Vec<Product>>,
    friends: Mutex<Vec<FriendItem>>,
    history: Mutex<Vec<HistoryItem>>,
    ability_expiry: Mutex<Vec<(Ability, u16)>>,
    abilities: Mutex<Vec<Ability>>,

    // settings
    language: RwLock<String>,
    notify_new_battles: AtomicBool,

    // plumbing
    sender: RwLock<Option<Arc<dyn CommandSender>>>,
    store: RwLock<Option<Arc<dyn FileStore>>>,
    events: EventSender,
}

impl Model {
    /// Creates a model raising events into `events`. The sender and store
    /// are wired afterwards; requests made before that are dropped.
    #[must_use]
    pub fn new(events: EventSender) -> Self {
        Self {
            name: RwLock::new(String::new()),
            hash: RwLock::new(String::new()),
            enemy: RwLock::new(String::new()),
            promocode: RwLock::new(String::new()),
            character: AtomicU8::new(Character::None as u8),
            // Optimistic until the transport reports otherwise, so
            // requests made during startup are not silently dropped.
            connected: AtomicBool::new(true),
            authorized: AtomicBool::new(false),
            promocode_valid: AtomicBool::new(false),
            newbie: AtomicBool::new(true),
            crystals: AtomicU32::new(0),
            single_player_progress: AtomicU32::new(0),
            aggressor: AtomicBool::new(true),
            character1: AtomicU8::new(Character::None as u8),
            character2: AtomicU8::new(Character::None as u8),
            total_score1: AtomicU8::new(0),
            total_score2: AtomicU8::new(0),
            round_number: AtomicU8::new(0),
            round_length_sec: AtomicU8::new(60),
            style_pack: AtomicU8::new(0),
            field: Mutex::new(None),
            cur_actor: Mutex::new(None),
            cur_thing: Mutex::new(None),
            enemy_thing: Mutex::new(None),
            products: Mutex::new(Vec::new()),
            friends: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            ability_expiry: Mutex::new(Vec::new()),
            abilities: Mutex::new(Vec::new()),
            language: RwLock::new("en".into()),
            notify_new_battles: AtomicBool::new(true),
            sender: RwLock::new(None),
            store: RwLock::new(None),
            events,
        }
    }

    /// Wires the outbound seam.
    pub fn set_sender(&self, sender: Arc<dyn CommandSender>) {
        *self.sender.write() = Some(sender);
    }

    /// Wires the persistence seam.
    pub fn set_store(&self, store: Arc<dyn FileStore>) {
        *self.store.write() = Some(store);
    }

    // =========================================================================
    // Settings & local state
    // =========================================================================

    /// Loads settings from the store. A present settings file means this
    /// is not a first launch.
    pub fn load_settings(&self) {
        let Some(store) = self.store.read().clone() else {
            return;
        };
        if let Some(settings) = Settings::load(store.as_ref()) {
            *self.language.write() = settings.language;
            self.notify_new_battles
                .store(settings.notify_new_battles, Ordering::Release);
            *self.name.write() = settings.name;
            *self.hash.write() = settings.hash;
            self.newbie.store(false, Ordering::Release);
        }
    }

    /// Writes the current settings to the store.
    pub fn save_settings(&self) {
        let Some(store) = self.store.read().clone() else {
            return;
        };
        Settings {
            language: self.language.read().clone(),
            notify_new_battles: self.notify_new_battles.load(Ordering::Acquire),
            name: self.name.read().clone(),
            hash: self.hash.read().clone(),
        }
        .save(store.as_ref());
    }

    /// UI language code.
    #[must_use]
    pub fn language(&self) -> String {
        self.language.read().clone()
    }

    /// Changes the UI language and persists it.
    pub fn set_language(&self, language: &str) {
        *self.language.write() = language.to_owned();
        self.save_settings();
    }

    /// Whether incoming invitations pop a system notification.
    #[must_use]
    pub fn notify_new_battles(&self) -> bool {
        self.notify_new_battles.load(Ordering::Acquire)
    }

    /// Toggles invitation notifications and persists the choice.
    pub fn set_notify_new_battles(&self, value: bool) {
        self.notify_new_battles.store(value, Ordering::Release);
        self.save_settings();
    }

    // =========================================================================
    // Read-only snapshots
    // =========================================================================

    /// Our user name.
    #[must_use]
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// The current or last enemy's name.
    #[must_use]
    pub fn enemy(&self) -> String {
        self.enemy.read().clone()
    }

    /// Our personal promo code.
    #[must_use]
    pub fn promocode(&self) -> String {
        self.promocode.read().clone()
    }

    /// Our chosen character.
    #[must_use]
    pub fn character(&self) -> Character {
        Character::from_u8(self.character.load(Ordering::Acquire)).unwrap_or(Character::None)
    }

    /// Whether the transport considers the connection up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Whether we are signed in.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::Acquire)
    }

    /// Whether the last checked promo code was valid.
    #[must_use]
    pub fn is_promocode_valid(&self) -> bool {
        self.promocode_valid.load(Ordering::Acquire)
    }

    /// True until a settings file proves an earlier launch.
    #[must_use]
    pub fn is_newbie(&self) -> bool {
        self.newbie.load(Ordering::Acquire)
    }

    /// Crystal balance.
    #[must_use]
    pub fn crystals(&self) -> u32 {
        self.crystals.load(Ordering::Acquire)
    }

    /// Rounds won in single-player training.
    #[must_use]
    pub fn single_player_progress(&self) -> u32 {
        self.single_player_progress.load(Ordering::Acquire)
    }

    /// True when we are the aggressor of the current battle.
    #[must_use]
    pub fn is_aggressor(&self) -> bool {
        self.aggressor.load(Ordering::Acquire)
    }

    /// Both battle characters (aggressor, defender).
    #[must_use]
    pub fn battle_characters(&self) -> (Character, Character) {
        (
            Character::from_u8(self.character1.load(Ordering::Acquire)).unwrap_or(Character::None),
            Character::from_u8(self.character2.load(Ordering::Acquire)).unwrap_or(Character::None),
        )
    }

    /// Game totals so far (aggressor, defender).
    #[must_use]
    pub fn total_scores(&self) -> (u8, u8) {
        (
            self.total_score1.load(Ordering::Acquire),
            self.total_score2.load(Ordering::Acquire),
        )
    }

    /// Current round number, starting at 1.
    #[must_use]
    pub fn round_number(&self) -> u8 {
        self.round_number.load(Ordering::Acquire)
    }

    /// Server-configured round length in seconds.
    #[must_use]
    pub fn round_length_sec(&self) -> u8 {
        self.round_length_sec.load(Ordering::Acquire)
    }

    /// Battlefield style pack id.
    #[must_use]
    pub fn style_pack(&self) -> u8 {
        self.style_pack.load(Ordering::Acquire)
    }

    /// A copy of the current battlefield, if a battle is on.
    #[must_use]
    pub fn field_snapshot(&self) -> Option<Field> {
        self.field.lock().clone()
    }

    /// A copy of our actor, if bound.
    #[must_use]
    pub fn cur_actor(&self) -> Option<CellObject> {
        let number = (*self.cur_actor.lock())?;
        self.field.lock().as_ref()?.object(number).copied()
    }

    /// The thing we currently hold.
    #[must_use]
    pub fn cur_thing(&self) -> Option<ObjectKind> {
        *self.cur_thing.lock()
    }

    /// The thing the enemy currently holds.
    #[must_use]
    pub fn enemy_thing(&self) -> Option<ObjectKind> {
        *self.enemy_thing.lock()
    }

    /// Copy of the product catalogue.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.products.lock().clone()
    }

    /// Products offering the given ability.
    #[must_use]
    pub fn products_by_ability(&self, ability: Ability) -> Vec<Product> {
        self.products
            .lock()
            .iter()
            .filter(|p| p.ability == ability)
            .copied()
            .collect()
    }

    /// Copy of the friend list.
    #[must_use]
    pub fn friends(&self) -> Vec<FriendItem> {
        self.friends.lock().clone()
    }

    /// Whether `name` is already a friend.
    #[must_use]
    pub fn friend_exists(&self, name: &str) -> bool {
        self.friends.lock().iter().any(|f| f.name == name)
    }

    /// Copy of the local battle history, newest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryItem> {
        self.history.lock().clone()
    }

    /// Copy of the paid-ability expiry table.
    #[must_use]
    pub fn ability_expiry(&self) -> Vec<(Ability, u16)> {
        self.ability_expiry.lock().clone()
    }

    /// Copy of the abilities usable this round.
    #[must_use]
    pub fn abilities(&self) -> Vec<Ability> {
        self.abilities.lock().clone()
    }

    // =========================================================================
    // Server requests
    // =========================================================================
    // Safe to call from any thread; silently dropped while disconnected.
    // =========================================================================

    /// Signs in with explicit credentials. The password digest, not the
    /// password, is what travels and what gets stored for silent re-auth.
    pub fn sign_in(&self, login: &str, password: &str) {
        let hash = md5_hex(password);
        *self.hash.write() = hash.clone();
        *self.name.write() = login.to_owned();
        self.reset_and_send(
            Command::SignIn,
            &FrameWriter::new()
                .put_u8(1) // local auth
                .put_str_nul(login)
                .put_str(&hash)
                .finish(),
        );
    }

    /// Signs in with the stored credentials, if any. Used on reconnect and
    /// when the server reports a stale session.
    pub fn sign_in_stored(&self) {
        let name = self.name.read().clone();
        let hash = self.hash.read().clone();
        if name.is_empty() || hash.is_empty() {
            return;
        }
        self.reset_and_send(
            Command::SignIn,
            &FrameWriter::new()
                .put_u8(1)
                .put_str_nul(&name)
                .put_str(&hash)
                .finish(),
        );
    }

    /// Creates an account. Weak passwords are rejected locally.
    pub fn sign_up(&self, login: &str, password: &str, email: &str, promocode: &str) {
        if password.len() < 4 {
            return;
        }
        let hash = md5_hex(password);
        *self.hash.write() = hash.clone();
        *self.name.write() = login.to_owned();
        self.reset_and_send(
            Command::SignUp,
            &FrameWriter::new()
                .put_str_nul(login)
                .put_str_nul(&hash)
                .put_str_nul(email)
                .put_str(promocode)
                .finish(),
        );
    }

    /// Terminates the session on the server.
    pub fn sign_out(&self) {
        self.send(Command::SignOut, &[]);
    }

    /// Requests the user profile. Doubles as the keep-alive ping and the
    /// reconnect probe.
    pub fn user_info(&self) {
        self.send(Command::UserInfo, &[]);
    }

    /// Invites an enemy by name.
    pub fn invite(&self, victim: &str) {
        self.send(
            Command::Attack,
            &FrameWriter::new().put_u8(0).put_str(victim).finish(),
        );
    }

    /// Invites the latest enemy again.
    pub fn invite_latest(&self) {
        self.send(Command::Attack, &[1]);
    }

    /// Invites a random free enemy.
    pub fn invite_random(&self) {
        self.send(Command::Attack, &[2]);
    }

    /// Accepts the invitation from session `enemy_sid`.
    pub fn accept(&self, enemy_sid: u16) {
        self.send(
            Command::Accept,
            &FrameWriter::new().put_u16_be(enemy_sid).finish(),
        );
    }

    /// Rejects the invitation from session `enemy_sid`.
    pub fn reject(&self, enemy_sid: u16) {
        self.send(
            Command::Reject,
            &FrameWriter::new().put_u16_be(enemy_sid).finish(),
        );
    }

    /// Withdraws our own pending invitation.
    pub fn cancel_call(&self) {
        self.send(Command::CancelCall, &[]);
    }

    /// Asks the server for the training battle.
    pub fn receive_training(&self) {
        self.send(Command::ReceiveTraining, &[]);
    }

    /// Selects a character.
    pub fn change_character(&self, character: Character) {
        if character != Character::None {
            self.send(Command::ChangeCharacter, &[character as u8]);
        }
    }

    /// Requests the friend list.
    pub fn request_friends(&self) {
        self.send(Command::FriendList, &[]);
    }

    /// Adds a friend by name.
    pub fn add_friend(&self, name: &str) {
        if !name.is_empty() {
            self.send(Command::AddFriend, name.as_bytes());
        }
    }

    /// Removes a friend by name.
    pub fn remove_friend(&self, name: &str) {
        if !name.is_empty() {
            self.send(Command::RemoveFriend, name.as_bytes());
        }
    }

    /// Requests a rating table.
    pub fn request_rating(&self, kind: RatingType) {
        self.send(Command::Rating, &[kind as u8]);
    }

    /// Validates a promo code before sign-up.
    pub fn check_promocode(&self, promocode: &str) {
        if promocode.len() >= PROMOCODE_MIN_LEN {
            self.send(Command::CheckPromocode, promocode.as_bytes());
        }
    }

    /// Buys a product; the server answers with a fresh `UserInfo`.
    pub fn buy_product(&self, product: Product) {
        self.send(Command::BuyProduct, &[product.ability as u8, product.days]);
    }

    /// Requests a move. Pre-validated against the field edge so the
    /// server never sees a request that cannot possibly be legal.
    pub fn request_move(&self, direction: MoveDirection) {
        let Some(actor) = self.cur_actor() else {
            return;
        };
        let allowed = match direction {
            MoveDirection::LeftDown | MoveDirection::Left | MoveDirection::LeftUp => actor.x() > 0,
            MoveDirection::RightDown | MoveDirection::Right | MoveDirection::RightUp => {
                actor.x() < WIDTH - 1
            }
        };
        if allowed {
            self.send(Command::Move, &[direction as u8]);
        }
    }

    /// Uses the thing currently held, if any.
    pub fn use_thing(&self) {
        // Copy the hand out first: the reply re-enters the model on this
        // thread in training mode.
        let thing = *self.cur_thing.lock();
        if let Some(thing) = thing {
            self.send(Command::UseThing, &[thing as u8]);
        }
    }

    /// Casts a skill. Passive gear cannot be "used" and is filtered here.
    pub fn use_skill(&self, ability: Ability) {
        if ability.is_skill() {
            self.send(Command::UseSkill, &[ability as u8]);
        }
    }

    /// Concedes the battle.
    pub fn give_up(&self) {
        *self.field.lock() = None;
        *self.cur_actor.lock() = None;
        self.send(Command::GiveUp, &[]);
    }

    // =========================================================================
    // Server responses
    // =========================================================================
    // Called by the dispatcher and the battle engine only.
    // =========================================================================

    /// Connectivity changed. On regaining the link while authorized, a
    /// harmless `UserInfo` probe goes out first: if the server restarted,
    /// the probe draws the stale-session error and triggers re-sign-in
    /// before any user-initiated request can fail. While unauthorized,
    /// stored credentials are retried directly.
    pub fn set_connected(&self, value: bool) {
        let was = self.connected.load(Ordering::Acquire);
        if !was && value {
            self.connected.store(true, Ordering::Release);
            if self.is_authorized() {
                self.user_info();
            } else {
                self.sign_in_stored();
            }
        }
        self.connected.store(value, Ordering::Release);
        if was != value {
            self.raise(ModelEvent::ConnectivityChanged { connected: value });
        }
    }

    /// Sign-in/out completed. A fresh sign-in pulls the catalogue and the
    /// friend list; sign-out wipes the stored digest.
    pub fn set_authorized(&self, value: bool) {
        self.authorized.store(value, Ordering::Release);
        if value {
            self.send(Command::RangeOfProducts, &[]);
            self.send(Command::FriendList, &[]);
        } else {
            self.hash.write().clear();
            self.save_settings();
        }
        self.raise(ModelEvent::AuthorizedChanged { authorized: value });
    }

    /// Applies a decoded `UserInfo` reply.
    pub fn apply_user_info(&self, profile: UserProfile) {
        *self.name.write() = profile.name.clone();
        *self.promocode.write() = profile.promocode;

        let old = self.character.swap(profile.character as u8, Ordering::AcqRel);
        if old != profile.character as u8 {
            self.raise(ModelEvent::CharacterChanged {
                character: profile.character,
            });
        }

        self.crystals.store(profile.crystals, Ordering::Release);

        let mut expiry = profile.ability_expiry;
        expiry.sort_by_key(|&(ability, _)| ability as u8);
        *self.ability_expiry.lock() = expiry.clone();
        self.raise(ModelEvent::AbilityExpiryUpdated { abilities: expiry });

        // First profile after sign-in: the name is now known, so the
        // local history can be loaded and the settings saved.
        if !profile.name.is_empty() {
            if let Some(store) = self.store.read().clone() {
                let mut history = self.history.lock();
                if history.is_empty() {
                    *history = HistoryFile::load(store.as_ref(), &profile.name).items;
                }
            }
            self.save_settings();
        }
    }

    /// The server confirmed our invitation went out to `victim`.
    pub fn set_victim(&self, victim: &str) {
        *self.enemy.write() = victim.to_owned();
        self.raise(ModelEvent::InviteSent {
            victim: victim.to_owned(),
        });
    }

    /// Someone invited us.
    pub fn attacked(&self, enemy_sid: u16, enemy: &str) {
        *self.enemy.write() = enemy.to_owned();
        self.raise(ModelEvent::Invite {
            enemy: enemy.to_owned(),
            enemy_sid,
        });
    }

    /// A pending invitation was closed.
    pub fn stop_call(&self, reason: StopCallReason, name: &str) {
        self.raise(ModelEvent::StopCall {
            reason,
            name: name.to_owned(),
        });
    }

    /// Replaces (or, for follow-up fragments, extends) the friend list.
    pub fn set_friend_list(&self, items: Vec<FriendItem>, append: bool) {
        let snapshot = {
            let mut friends = self.friends.lock();
            if append {
                friends.extend(items);
            } else {
                *friends = items;
            }
            friends.clone()
        };
        self.raise(ModelEvent::FriendListUpdated { friends: snapshot });
    }

    /// The server confirmed a friend addition.
    pub fn friend_added(&self, friend: FriendItem) {
        self.friends.lock().push(friend.clone());
        self.raise(ModelEvent::FriendAdded { friend });
    }

    /// The server confirmed a friend removal.
    pub fn friend_removed(&self, name: &str) {
        self.friends.lock().retain(|f| f.name != name);
        self.raise(ModelEvent::FriendRemoved {
            name: name.to_owned(),
        });
    }

    /// Replaces the product catalogue.
    pub fn set_products(&self, products: Vec<Product>) {
        *self.products.lock() = products;
    }

    /// A rating table arrived.
    pub fn set_rating(&self, kind: RatingType, items: Vec<RatingItem>) {
        self.raise(ModelEvent::RatingUpdated { kind, items });
    }

    /// The server judged a checked promo code.
    pub fn set_promocode_valid(&self, valid: bool) {
        self.promocode_valid.store(valid, Ordering::Release);
    }

    /// A promo code we were part of paid out.
    pub fn promocode_done(&self, name: &str, inviter: bool, crystals: u8) {
        self.raise(ModelEvent::PromocodeDone {
            name: name.to_owned(),
            inviter,
            crystals,
        });
    }

    /// A round is starting; battle-scoped state is reset.
    #[allow(clippy::too_many_arguments)]
    pub fn set_round_info(
        &self,
        number: u8,
        time_sec: u8,
        aggressor: bool,
        character1: Character,
        character2: Character,
        lives1: u8,
        lives2: u8,
    ) {
        *self.cur_thing.lock() = None;
        *self.enemy_thing.lock() = None;
        *self.cur_actor.lock() = None;
        self.round_number.store(number, Ordering::Release);
        self.round_length_sec.store(time_sec, Ordering::Release);
        self.aggressor.store(aggressor, Ordering::Release);
        self.character1.store(character1 as u8, Ordering::Release);
        self.character2.store(character2 as u8, Ordering::Release);
        self.raise(ModelEvent::ScoreChanged {
            score1: 0,
            score2: 0,
        });
        self.raise(ModelEvent::LivesChanged {
            lives1,
            lives2,
            reset: true,
        });
    }

    /// Replaces the battlefield from `FullState` grid bytes and binds our
    /// actor. The grid may lack the actor; it then arrives later through
    /// [`Model::append_object`].
    pub fn set_new_field(&self, grid: &[u8]) {
        let field = Field::from_bytes(grid);
        let our_kind = if self.is_aggressor() {
            ObjectKind::Actor1
        } else {
            ObjectKind::Actor2
        };
        *self.cur_actor.lock() = field.find_kind(our_kind).map(|o| o.number);
        *self.field.lock() = Some(field);
    }

    /// Adds one object from an `ObjectAppended` triple or a `FullState`
    /// extras section, re-binding our actor when an actor id arrives.
    pub fn append_object(&self, number: u8, id: u8, xy: u8) {
        let mut field = self.field.lock();
        let Some(field) = field.as_mut() else {
            return;
        };
        field.append_object(number, id, xy);
        if ObjectKind::from_u8(id).is_some_and(ObjectKind::is_actor) {
            let our_kind = if self.is_aggressor() {
                ObjectKind::Actor1
            } else {
                ObjectKind::Actor2
            };
            *self.cur_actor.lock() = field.find_kind(our_kind).map(|o| o.number);
        }
    }

    /// The battlefield style pack changed.
    pub fn set_style_pack(&self, pack: u8) {
        self.style_pack.store(pack, Ordering::Release);
        self.raise(ModelEvent::StyleChanged { pack });
    }

    /// Relocates one object (from a `StateChanged` pair).
    pub fn set_xy(&self, number: u8, xy: u8) {
        if let Some(field) = self.field.lock().as_mut() {
            field.set_xy(number, xy);
        }
    }

    /// The round score changed.
    pub fn set_score(&self, score1: u8, score2: u8) {
        self.raise(ModelEvent::ScoreChanged { score1, score2 });
    }

    /// A thing entered our hands (0 empties them).
    pub fn set_thing(&self, thing_id: u8) {
        let thing = ObjectKind::from_u8(thing_id);
        *self.cur_thing.lock() = thing;
        self.raise(ModelEvent::ThingChanged { mine: true, thing });
    }

    /// A thing entered the enemy's hands (0 empties them).
    pub fn set_enemy_thing(&self, thing_id: u8) {
        let thing = ObjectKind::from_u8(thing_id);
        *self.enemy_thing.lock() = thing;
        self.raise(ModelEvent::ThingChanged { mine: false, thing });
    }

    /// Lives changed after a wound.
    pub fn set_lives(&self, lives1: u8, lives2: u8) {
        self.raise(ModelEvent::LivesChanged {
            lives1,
            lives2,
            reset: false,
        });
    }

    /// The server acknowledged a move request.
    pub fn move_ack(&self) {
        self.raise(ModelEvent::MoveAck);
    }

    /// The round ended; `score1`/`score2` are game totals.
    pub fn round_finished(&self, winner: bool, score1: u8, score2: u8) {
        self.total_score1.store(score1, Ordering::Release);
        self.total_score2.store(score2, Ordering::Release);
        self.raise(ModelEvent::RoundFinished { winner });
    }

    /// The game ended: record it in the local history and drop the
    /// battlefield. Training battles (no enemy name) stay out of history.
    pub fn game_finished(&self, winner: bool) {
        let enemy = self.enemy.read().clone();
        if !enemy.is_empty() {
            let name = self.name.read().clone();
            let aggressor = self.is_aggressor();
            let (score1, score2) = self.total_scores();
            let item = HistoryItem {
                timestamp_ms: now_ms(),
                winner,
                aggressor: if aggressor { name.clone() } else { enemy.clone() },
                defender: if aggressor { enemy } else { name.clone() },
                character1: self.character1.load(Ordering::Acquire),
                character2: self.character2.load(Ordering::Acquire),
                score1,
                score2,
            };
            let snapshot = {
                let mut history = self.history.lock();
                history.insert(0, item);
                history.truncate(HISTORY_MAX);
                history.clone()
            };
            if let Some(store) = self.store.read().clone() {
                HistoryFile { items: snapshot }.save(store.as_ref(), &name);
            }
        }
        *self.field.lock() = None;
        *self.cur_actor.lock() = None;
        self.raise(ModelEvent::GameFinished { winner });
    }

    /// Replaces the usable-abilities list for the current round.
    pub fn set_abilities(&self, abilities: Vec<Ability>) {
        *self.abilities.lock() = abilities.clone();
        self.raise(ModelEvent::AbilitiesChanged { abilities });
    }

    /// Records a won (or lost) single-player battle.
    pub fn advance_single_player_progress(&self, winner: bool) {
        if winner {
            self.single_player_progress.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// A billing purchase completed.
    pub fn payment_done(&self, crystals: u32, coupon: &str) {
        self.raise(ModelEvent::PaymentDone {
            crystals,
            coupon: coupon.to_owned(),
        });
    }

    /// Surfaces a semantic fault to the UI. A dead battle also drops the
    /// battlefield so the UI leaves the battle screen.
    pub fn fault(&self, fault: Fault) {
        if fault == Fault::BattleNotFound {
            *self.field.lock() = None;
            *self.cur_actor.lock() = None;
        }
        self.raise(ModelEvent::Fault { fault });
    }

    // =========================================================================

    fn send(&self, command: Command, args: &[u8]) {
        if !self.is_connected() {
            return;
        }
        // Clone the handle out before calling: replies can re-enter the
        // model (and this helper) on the same thread.
        let sender = self.sender.read().clone();
        if let Some(sender) = sender {
            sender.send(command, args);
        }
    }

    fn reset_and_send(&self, command: Command, args: &[u8]) {
        if !self.is_connected() {
            return;
        }
        let sender = self.sender.read().clone();
        if let Some(sender) = sender {
            sender.reset();
            sender.send(command, args);
        }
    }

    fn raise(&self, event: ModelEvent) {
        self.events.raise(event);
    }
}

/// Lowercase hex md5 digest, the format the server compares against.
#[must_use]
pub fn md5_hex(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Periodic `UserInfo` ping keeping an authorized session alive. Stops on
/// drop; the flag check keeps shutdown prompt.
pub struct KeepAlive {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeepAlive {
    /// Spawns the ping thread.
    #[must_use]
    pub fn start(model: Arc<Model>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("scurry-ping".into())
            .spawn(move || {
                const STEP: Duration = Duration::from_millis(250);
                let mut elapsed = Duration::ZERO;
                while !flag.load(Ordering::Acquire) {
                    std::thread::sleep(STEP);
                    elapsed += STEP;
                    if elapsed >= PING_PERIOD {
                        elapsed = Duration::ZERO;
                        if model.is_authorized() {
                            model.user_info();
                        }
                    }
                }
            })
            .expect("spawn ping thread");
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Requests the thread to stop.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::stub::StubBilling;
    use crate::billing::BillingProvider;
    use crate::events::EventBus;
    use crate::field::CELL_COUNT;
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(Command, Vec<u8>)>>,
        resets: AtomicU32,
    }

    impl CommandSender for RecordingSender {
        fn send(&self, command: Command, args: &[u8]) {
            self.sent.lock().push((command, args.to_vec()));
        }
        fn reset(&self) {
            self.resets.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn harness() -> (Arc<Model>, Arc<RecordingSender>, crate::EventReceiver) {
        let (events, receiver) = EventBus::create_pair(64);
        let model = Arc::new(Model::new(events));
        let sender = Arc::new(RecordingSender::default());
        model.set_sender(Arc::clone(&sender) as Arc<dyn CommandSender>);
        model.set_store(Arc::new(MemoryStore::new()));
        (model, sender, receiver)
    }

    #[test]
    fn test_sign_in_resets_and_sends_digest() {
        let (model, sender, _rx) = harness();
        model.sign_in("Bobby", "secret");
        assert_eq!(sender.resets.load(Ordering::Acquire), 1);
        let sent = sender.sent.lock();
        let (command, args) = &sent[0];
        assert_eq!(*command, Command::SignIn);
        // auth type, login, NUL, then the 32-char hex digest.
        assert_eq!(args[0], 1);
        assert_eq!(&args[1..6], b"Bobby");
        assert_eq!(args[6], 0);
        assert_eq!(&args[7..], md5_hex("secret").as_bytes());
    }

    #[test]
    fn test_reconnect_probes_with_user_info_when_authorized() {
        let (model, sender, _rx) = harness();
        model.set_authorized(true);
        sender.sent.lock().clear();

        model.set_connected(false);
        model.set_connected(true);
        // The harmless probe goes out before anything user-initiated.
        assert_eq!(sender.sent.lock()[0].0, Command::UserInfo);
    }

    #[test]
    fn test_reconnect_retries_stored_credentials_when_unauthorized() {
        let (model, sender, _rx) = harness();
        model.sign_in("Bobby", "secret");
        sender.sent.lock().clear();

        model.set_connected(false);
        model.set_connected(true);
        assert_eq!(sender.sent.lock()[0].0, Command::SignIn);
        assert_eq!(sender.resets.load(Ordering::Acquire), 2);
    }

    #[test]
    fn test_requests_dropped_while_disconnected() {
        let (model, sender, _rx) = harness();
        model.set_connected(false);
        model.user_info();
        model.invite_random();
        assert!(sender.sent.lock().is_empty());
    }

    #[test]
    fn test_move_blocked_at_field_edges() {
        let (model, sender, _rx) = harness();
        let mut grid = vec![0u8; CELL_COUNT];
        grid[0] = ObjectKind::Actor1 as u8; // x == 0
        model.set_new_field(&grid);

        model.request_move(MoveDirection::Left);
        model.request_move(MoveDirection::LeftUp);
        assert!(sender.sent.lock().is_empty());
        model.request_move(MoveDirection::Right);
        assert_eq!(
            sender.sent.lock().as_slice(),
            &[(Command::Move, vec![MoveDirection::Right as u8])]
        );
    }

    #[test]
    fn test_sign_out_wipes_stored_digest() {
        let (model, _sender, _rx) = harness();
        model.sign_in("Bobby", "secret");
        model.set_authorized(false);
        model.set_connected(false);
        model.set_connected(true);
        // No stored hash left, so nothing to retry with.
        assert!(!model.is_authorized());
    }

    #[test]
    fn test_game_finished_caps_history_at_max() {
        let (model, _sender, _rx) = harness();
        model.attacked(300, "Alice");
        for _ in 0..(HISTORY_MAX + 8) {
            model.game_finished(true);
        }
        assert_eq!(model.history().len(), HISTORY_MAX);
    }

    #[test]
    fn test_training_game_stays_out_of_history() {
        let (model, _sender, _rx) = harness();
        model.game_finished(true);
        assert!(model.history().is_empty());
    }

    #[test]
    fn test_round_info_resets_battle_state() {
        let (model, _sender, rx) = harness();
        model.set_thing(ObjectKind::Umbrella as u8);
        model.set_round_info(1, 90, true, Character::Rabbit, Character::Cat, 3, 3);
        assert_eq!(model.cur_thing(), None);
        assert_eq!(model.round_number(), 1);
        let events = rx.drain();
        assert!(events.contains(&ModelEvent::ScoreChanged { score1: 0, score2: 0 }));
        assert!(events.contains(&ModelEvent::LivesChanged {
            lives1: 3,
            lives2: 3,
            reset: true
        }));
    }

    #[test]
    fn test_billing_surface_raises_payment_done() {
        let (model, _sender, rx) = harness();
        let billing = StubBilling::default();
        billing.purchase("crystals_100");
        // Platform code reports completion back through the model.
        model.payment_done(100, "coupon-1");
        assert_eq!(
            rx.drain(),
            vec![ModelEvent::PaymentDone {
                crystals: 100,
                coupon: "coupon-1".into()
            }]
        );
        assert_eq!(billing.purchased.lock().as_slice(), ["crystals_100"]);
    }
}
