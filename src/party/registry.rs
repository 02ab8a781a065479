//! Room party registry with per-room locking and deadline-driven expiry.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex as AsyncMutex, OwnedMutexGuard};

use crate::chat::{Announcer, RoomId, Sender, UserId};
use crate::config::PartyConfig;

use super::error::PartyError;
use super::format;
use super::model::{extract_class_and_main, Member, MemberId, Party, PartyId, PartyKind};
use super::time_spec::TimeSpec;
use super::timer::{DeadlineQueue, TimerKey};

/// Where "one party per owner" is enforced.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateScope {
    /// An owner may run one party in each room.
    #[default]
    Room,
    /// An owner may run one party across all rooms.
    Global,
}

type OwnerKey = (Option<RoomId>, UserId);

/// Parameters of a new party.
#[derive(Debug, Clone)]
pub struct NewParty {
    pub kind: PartyKind,
    pub time: TimeSpec,
    pub title: Option<String>,
    pub class: Option<String>,
    pub is_main: bool,
}

/// How `join` picks the party.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinTarget {
    Id(PartyId),
    /// Owner nickname, or the class when the room has a single party.
    Word(String),
    Unspecified,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberChange {
    Class(String),
    Role(bool),
    Unchanged,
}

#[derive(Debug, Clone)]
pub enum JoinOutcome {
    Joined {
        party: Party,
        member: Member,
        became_full: bool,
    },
    /// The user was already a member and changed their class or role.
    Updated {
        party: Party,
        member: Member,
        change: MemberChange,
    },
}

#[derive(Debug, Default)]
pub struct LeaveSummary {
    /// Parties the user left that still exist.
    pub left: Vec<Party>,
    /// Parties deleted because the user owned them or they became empty.
    pub cancelled: Vec<Party>,
}

#[derive(Default)]
struct RoomParties {
    parties: Vec<Party>,
    /// Set once the room is removed from the map; holders must look it up again.
    retired: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn timer_key(party: &Party) -> TimerKey {
    TimerKey {
        room: party.room,
        party: party.id,
        token: party.timer_token,
    }
}

/// Lowest positive id not used in the room.
fn next_party_id(parties: &[Party]) -> PartyId {
    let used: HashSet<PartyId> = parties.iter().map(|p| p.id).collect();
    let mut id = 1;
    while used.contains(&id) {
        id += 1;
    }
    id
}

/// Exact owner-name match first, then substring; case-insensitive, `@` ignored.
fn find_by_owner_name(parties: &[Party], name: &str) -> Option<usize> {
    let norm = name.trim_start_matches('@').trim().to_lowercase();
    if norm.is_empty() {
        return None;
    }
    parties
        .iter()
        .position(|p| p.owner_name.to_lowercase() == norm)
        .or_else(|| {
            parties
                .iter()
                .position(|p| p.owner_name.to_lowercase().contains(&norm))
        })
}

fn sorted(parties: &[Party]) -> Vec<Party> {
    let mut out = parties.to_vec();
    out.sort_by_key(|p| p.id);
    out
}

/// All parties of all rooms.
pub struct PartyRegistry {
    config: PartyConfig,
    rooms: Mutex<HashMap<RoomId, Arc<AsyncMutex<RoomParties>>>>,
    owners: Mutex<HashSet<OwnerKey>>,
    timers: DeadlineQueue<TimerKey>,
    next_token: AtomicU64,
}

impl PartyRegistry {
    /// Create the registry and start its deadline loop. Due timers arrive on the
    /// returned receiver; hand it to [`run_timer_loop`].
    pub fn new(config: PartyConfig) -> (Self, mpsc::UnboundedReceiver<TimerKey>) {
        let (timers, due) = DeadlineQueue::spawn();
        let registry = Self {
            config,
            rooms: Mutex::new(HashMap::new()),
            owners: Mutex::new(HashSet::new()),
            timers,
            next_token: AtomicU64::new(1),
        };
        (registry, due)
    }

    fn owner_key(&self, room: RoomId, user: UserId) -> OwnerKey {
        match self.config.duplicate_scope {
            DuplicateScope::Room => (Some(room), user),
            DuplicateScope::Global => (None, user),
        }
    }

    fn capacity(&self, kind: PartyKind) -> usize {
        match kind {
            PartyKind::Normal => self.config.normal_capacity,
            PartyKind::Raid => self.config.raid_capacity,
        }
    }

    async fn lock_room(&self, room: RoomId) -> OwnedMutexGuard<RoomParties> {
        loop {
            let slot = lock(&self.rooms).entry(room).or_default().clone();
            let guard = slot.lock_owned().await;
            if !guard.retired {
                return guard;
            }
        }
    }

    async fn lock_existing_room(&self, room: RoomId) -> Option<OwnedMutexGuard<RoomParties>> {
        loop {
            let slot = lock(&self.rooms).get(&room).cloned()?;
            let guard = slot.lock_owned().await;
            if !guard.retired {
                return Some(guard);
            }
        }
    }

    /// Drop the room entry once it holds no parties. Called with the room lock held.
    fn retire_if_empty(&self, room: RoomId, parties: &mut RoomParties) {
        if parties.parties.is_empty() && !parties.retired {
            parties.retired = true;
            lock(&self.rooms).remove(&room);
        }
    }

    /// Release the owner slot and the pending timer of a removed party.
    fn release(&self, party: &Party) {
        lock(&self.owners).remove(&self.owner_key(party.room, party.owner_id));
        self.timers.cancel(timer_key(party));
    }

    /// Create a party owned by `owner` and schedule its start.
    pub async fn create(
        &self,
        room: RoomId,
        owner: &Sender,
        request: NewParty,
        now: DateTime<FixedOffset>,
    ) -> Result<Party, PartyError> {
        let scheduled_at = request.time.resolve(now)?;
        let mut guard = self.lock_room(room).await;

        if !lock(&self.owners).insert(self.owner_key(room, owner.id)) {
            let existing = guard
                .parties
                .iter()
                .find(|p| p.is_owner(owner.id))
                .cloned()
                .map(Box::new);
            self.retire_if_empty(room, &mut guard);
            return Err(PartyError::DuplicateParty { existing });
        }

        let owner_name = owner.display_name();
        let title = request
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| request.kind.default_title().to_string());
        let party = Party {
            id: next_party_id(&guard.parties),
            room,
            title,
            kind: request.kind,
            capacity: self.capacity(request.kind),
            scheduled_at,
            owner_id: owner.id,
            owner_name: owner_name.clone(),
            members: vec![Member {
                id: MemberId::User(owner.id),
                name: owner_name,
                class: request.class,
                is_main: request.is_main,
            }],
            timer_token: self.next_token.fetch_add(1, Ordering::Relaxed),
            next_guest: 1,
        };

        guard.parties.push(party.clone());
        self.timers.schedule(timer_key(&party), scheduled_at.with_timezone(&Utc));

        tracing::info!(
            room,
            party = party.id,
            owner = owner.id,
            at = %party.scheduled_at,
            "Party created"
        );
        Ok(party)
    }

    /// Join a party, or update class/role when already a member.
    pub async fn join(
        &self,
        room: RoomId,
        user: &Sender,
        target: JoinTarget,
        extra: &[String],
    ) -> Result<JoinOutcome, PartyError> {
        let mut guard = self.lock_existing_room(room).await.ok_or(PartyError::NoParties)?;
        if guard.parties.is_empty() {
            return Err(PartyError::NoParties);
        }

        let single = guard.parties.len() == 1;
        let (index, tokens) = match target {
            JoinTarget::Id(id) => {
                let idx = guard
                    .parties
                    .iter()
                    .position(|p| p.id == id)
                    .ok_or(PartyError::PartyNotFound(Some(id)))?;
                (idx, extra.to_vec())
            }
            JoinTarget::Word(word) if single => {
                let mut tokens = vec![word];
                tokens.extend_from_slice(extra);
                (0, tokens)
            }
            JoinTarget::Word(word) => {
                let idx = find_by_owner_name(&guard.parties, &word).ok_or_else(|| {
                    PartyError::AmbiguousParty {
                        parties: sorted(&guard.parties),
                    }
                })?;
                (idx, extra.to_vec())
            }
            JoinTarget::Unspecified if single => (0, extra.to_vec()),
            JoinTarget::Unspecified => {
                return Err(PartyError::AmbiguousParty {
                    parties: sorted(&guard.parties),
                })
            }
        };

        let (class, main) = extract_class_and_main(&tokens);
        let party = &mut guard.parties[index];

        if let Some(pos) = party.member_index(user.id) {
            if class.is_none() && main.is_none() {
                return Err(PartyError::AlreadyJoined {
                    party: Box::new(party.clone()),
                });
            }
            let member = &mut party.members[pos];
            let old_class = member.class.clone();
            let old_main = member.is_main;
            if let Some(c) = &class {
                member.class = Some(c.clone());
            }
            if let Some(m) = main {
                member.is_main = m;
            }
            let change = match (class, main) {
                (Some(c), _) if Some(&c) != old_class.as_ref() => MemberChange::Class(c),
                (_, Some(m)) if m != old_main => MemberChange::Role(m),
                _ => MemberChange::Unchanged,
            };
            let member = member.clone();
            return Ok(JoinOutcome::Updated {
                party: party.clone(),
                member,
                change,
            });
        }

        if party.is_full() {
            return Err(PartyError::PartyFull {
                capacity: party.capacity,
            });
        }

        let member = Member {
            id: MemberId::User(user.id),
            name: user.display_name(),
            class,
            is_main: main.unwrap_or(true),
        };
        party.members.push(member.clone());
        tracing::info!(room, party = party.id, user = user.id, "Party joined");

        Ok(JoinOutcome::Joined {
            became_full: party.is_full(),
            party: party.clone(),
            member,
        })
    }

    /// Leave every party of the room. Owned or emptied parties are deleted.
    pub async fn leave(&self, room: RoomId, user: UserId) -> Result<LeaveSummary, PartyError> {
        let mut guard = self.lock_existing_room(room).await.ok_or(PartyError::NoParties)?;
        if !guard.parties.iter().any(|p| p.contains(user)) {
            return Err(PartyError::NotJoined);
        }

        let mut summary = LeaveSummary::default();
        let mut kept = Vec::with_capacity(guard.parties.len());
        for mut party in guard.parties.drain(..) {
            if !party.contains(user) {
                kept.push(party);
                continue;
            }
            if party.is_owner(user) {
                self.release(&party);
                summary.cancelled.push(party);
                continue;
            }
            party.members.retain(|m| m.id != MemberId::User(user));
            if party.members.is_empty() {
                self.release(&party);
                summary.cancelled.push(party);
            } else {
                summary.left.push(party.clone());
                kept.push(party);
            }
        }
        guard.parties = kept;
        self.retire_if_empty(room, &mut guard);

        tracing::info!(
            room,
            user,
            left = summary.left.len(),
            cancelled = summary.cancelled.len(),
            "Party leave"
        );
        Ok(summary)
    }

    /// Delete the party `user` owns in this room.
    pub async fn delete(&self, room: RoomId, user: UserId) -> Result<Party, PartyError> {
        let mut guard = self.lock_existing_room(room).await.ok_or(PartyError::NoParties)?;
        let idx = guard
            .parties
            .iter()
            .position(|p| p.is_owner(user))
            .ok_or(PartyError::NotOwner)?;
        let party = guard.parties.remove(idx);
        self.release(&party);
        self.retire_if_empty(room, &mut guard);

        tracing::info!(room, party = party.id, owner = user, "Party deleted");
        Ok(party)
    }

    /// Owner adds a named guest. Returns the party and whether it just filled up.
    pub async fn add_member(
        &self,
        room: RoomId,
        owner: UserId,
        name: &str,
        extra: &[String],
    ) -> Result<(Party, bool), PartyError> {
        let mut guard = self.lock_existing_room(room).await.ok_or(PartyError::NotOwner)?;
        let party = guard
            .parties
            .iter_mut()
            .find(|p| p.is_owner(owner))
            .ok_or(PartyError::NotOwner)?;
        if party.is_full() {
            return Err(PartyError::PartyFull {
                capacity: party.capacity,
            });
        }

        let (class, main) = extract_class_and_main(extra);
        let guest = party.next_guest;
        party.next_guest += 1;
        party.members.push(Member {
            id: MemberId::Guest(guest),
            name: name.to_string(),
            class,
            is_main: main.unwrap_or(false),
        });
        Ok((party.clone(), party.is_full()))
    }

    /// Owner removes the member shown at 1-based `index`.
    pub async fn kick(&self, room: RoomId, owner: UserId, index: usize) -> Result<(Member, Party), PartyError> {
        let mut guard = self.lock_existing_room(room).await.ok_or(PartyError::NotOwner)?;
        let party = guard
            .parties
            .iter_mut()
            .find(|p| p.is_owner(owner))
            .ok_or(PartyError::NotOwner)?;
        if index == 1 {
            return Err(PartyError::CannotKickOwner);
        }
        if index == 0 || index > party.members.len() {
            return Err(PartyError::MemberNotFound(index));
        }
        let removed = party.members.remove(index - 1);
        tracing::info!(room, party = party.id, kicked = %removed.name, "Party member kicked");
        Ok((removed, party.clone()))
    }

    /// Parties of the room in id order.
    pub async fn status(&self, room: RoomId) -> Result<Vec<Party>, PartyError> {
        let guard = self.lock_existing_room(room).await.ok_or(PartyError::NoParties)?;
        if guard.parties.is_empty() {
            return Err(PartyError::NoParties);
        }
        Ok(sorted(&guard.parties))
    }

    /// The party `user` would advertise: their own, else the first they joined.
    pub async fn promote(&self, room: RoomId, user: UserId) -> Result<Party, PartyError> {
        let guard = self.lock_existing_room(room).await.ok_or(PartyError::NoParties)?;
        guard
            .parties
            .iter()
            .find(|p| p.is_owner(user))
            .or_else(|| sorted_ref(&guard.parties).into_iter().find(|p| p.contains(user)))
            .cloned()
            .ok_or(PartyError::NotJoined)
    }

    /// Remove the party a due timer refers to. A timer for a party that was
    /// already removed (or replaced) is a no-op.
    pub async fn fire(&self, key: TimerKey) -> Option<Party> {
        let mut guard = self.lock_existing_room(key.room).await?;
        let idx = guard
            .parties
            .iter()
            .position(|p| p.id == key.party && p.timer_token == key.token)?;
        let party = guard.parties.remove(idx);
        lock(&self.owners).remove(&self.owner_key(party.room, party.owner_id));
        self.retire_if_empty(key.room, &mut guard);

        tracing::info!(room = key.room, party = party.id, "Party timer fired");
        Some(party)
    }
}

fn sorted_ref(parties: &[Party]) -> Vec<&Party> {
    let mut out: Vec<&Party> = parties.iter().collect();
    out.sort_by_key(|p| p.id);
    out
}

/// Announce and delete parties whose start time has come.
pub async fn run_timer_loop(
    registry: Arc<PartyRegistry>,
    mut due: mpsc::UnboundedReceiver<TimerKey>,
    announcer: Arc<dyn Announcer>,
) {
    tracing::info!("Party timer loop started");
    while let Some(key) = due.recv().await {
        let Some(party) = registry.fire(key).await else {
            tracing::debug!("Ignoring stale party timer {:?}", key);
            continue;
        };
        let text = format::start_announcement(&party);
        if let Err(e) = announcer.announce(party.room, &text).await {
            tracing::error!(room = party.room, party = party.id, "Failed to announce party: {}", e);
        }
    }
    tracing::info!("Party timer loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::RecordingAnnouncer;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    fn registry() -> PartyRegistry {
        PartyRegistry::new(PartyConfig::default()).0
    }

    fn now() -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&FixedOffset::east_opt(9 * 3600).unwrap())
    }

    fn normal(minutes: u32) -> NewParty {
        NewParty {
            kind: PartyKind::Normal,
            time: TimeSpec::In { minutes },
            title: None,
            class: None,
            is_main: true,
        }
    }

    fn user(id: UserId) -> Sender {
        Sender::new(id, format!("user{}", id))
    }

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[tokio::test]
    async fn second_party_for_same_owner_is_rejected() {
        let reg = registry();
        let first = reg.create(1, &user(10), normal(30), now()).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.title, "파티");
        assert_eq!(first.members.len(), 1);

        let err = reg.create(1, &user(10), normal(30), now()).await.unwrap_err();
        match err {
            PartyError::DuplicateParty { existing } => assert_eq!(existing.unwrap().id, 1),
            other => panic!("unexpected {other:?}"),
        }

        // Room scope: another room is fine.
        assert!(reg.create(2, &user(10), normal(30), now()).await.is_ok());
    }

    #[tokio::test]
    async fn global_scope_rejects_across_rooms() {
        let config = PartyConfig {
            duplicate_scope: DuplicateScope::Global,
            ..PartyConfig::default()
        };
        let (reg, _due) = PartyRegistry::new(config);
        reg.create(1, &user(10), normal(30), now()).await.unwrap();
        let err = reg.create(2, &user(10), normal(30), now()).await.unwrap_err();
        assert!(matches!(err, PartyError::DuplicateParty { existing: None }));

        reg.delete(1, 10).await.unwrap();
        assert!(reg.create(2, &user(10), normal(30), now()).await.is_ok());
    }

    #[tokio::test]
    async fn capacity_is_never_exceeded() {
        let reg = registry();
        reg.create(1, &user(1), normal(30), now()).await.unwrap();
        for id in 2..=4 {
            let out = reg.join(1, &user(id), JoinTarget::Id(1), &[]).await.unwrap();
            if let JoinOutcome::Joined { became_full, .. } = out {
                assert_eq!(became_full, id == 4);
            } else {
                panic!("expected a join");
            }
        }
        let err = reg.join(1, &user(5), JoinTarget::Id(1), &[]).await.unwrap_err();
        assert!(matches!(err, PartyError::PartyFull { capacity: 4 }));

        let err = reg.add_member(1, 1, "게스트", &[]).await.unwrap_err();
        assert!(matches!(err, PartyError::PartyFull { .. }));
        assert_eq!(reg.status(1).await.unwrap()[0].members.len(), 4);
    }

    #[tokio::test]
    async fn raid_holds_eight() {
        let reg = registry();
        let raid = NewParty {
            kind: PartyKind::Raid,
            ..normal(30)
        };
        let party = reg.create(1, &user(1), raid, now()).await.unwrap();
        assert_eq!(party.capacity, 8);
        assert_eq!(party.title, "레이드 파티");
    }

    #[tokio::test]
    async fn join_errors_and_updates() {
        let reg = registry();
        assert!(matches!(
            reg.join(1, &user(2), JoinTarget::Unspecified, &[]).await,
            Err(PartyError::NoParties)
        ));

        reg.create(1, &user(1), normal(30), now()).await.unwrap();
        assert!(matches!(
            reg.join(1, &user(2), JoinTarget::Id(9), &[]).await,
            Err(PartyError::PartyNotFound(Some(9)))
        ));

        // Single party: a bare word is the class.
        let out = reg
            .join(1, &user(2), JoinTarget::Word("도적".to_string()), &toks("부"))
            .await
            .unwrap();
        match out {
            JoinOutcome::Joined { member, .. } => {
                assert_eq!(member.class.as_deref(), Some("도적"));
                assert!(!member.is_main);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            reg.join(1, &user(2), JoinTarget::Id(1), &[]).await,
            Err(PartyError::AlreadyJoined { .. })
        ));

        let out = reg.join(1, &user(2), JoinTarget::Id(1), &toks("전사")).await.unwrap();
        match out {
            JoinOutcome::Updated { change, .. } => assert_eq!(change, MemberChange::Class("전사".to_string())),
            other => panic!("unexpected {other:?}"),
        }
        let out = reg.join(1, &user(2), JoinTarget::Id(1), &toks("전사 본")).await.unwrap();
        match out {
            JoinOutcome::Updated { change, .. } => assert_eq!(change, MemberChange::Role(true)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn join_by_owner_name_with_several_parties() {
        let reg = registry();
        reg.create(1, &Sender::new(1, "홍길동"), normal(30), now()).await.unwrap();
        reg.create(1, &Sender::new(2, "임꺽정"), normal(30), now()).await.unwrap();

        assert!(matches!(
            reg.join(1, &user(3), JoinTarget::Unspecified, &[]).await,
            Err(PartyError::AmbiguousParty { ref parties }) if parties.len() == 2
        ));

        let out = reg
            .join(1, &user(3), JoinTarget::Word("@꺽정".to_string()), &toks("궁수"))
            .await
            .unwrap();
        match out {
            JoinOutcome::Joined { party, member, .. } => {
                assert_eq!(party.owner_id, 2);
                assert_eq!(member.class.as_deref(), Some("궁수"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn party_ids_reuse_lowest_free_number() {
        let reg = registry();
        for owner in 1..=3 {
            reg.create(1, &user(owner), normal(30), now()).await.unwrap();
        }
        reg.delete(1, 2).await.unwrap();
        let party = reg.create(1, &user(4), normal(30), now()).await.unwrap();
        assert_eq!(party.id, 2);
        let party = reg.create(1, &user(5), normal(30), now()).await.unwrap();
        assert_eq!(party.id, 4);
    }

    #[tokio::test]
    async fn leave_cancels_owned_parties_and_leaves_others() {
        let reg = registry();
        reg.create(1, &user(1), normal(30), now()).await.unwrap();
        reg.create(1, &user(2), normal(30), now()).await.unwrap();
        reg.join(1, &user(2), JoinTarget::Id(1), &[]).await.unwrap();

        let summary = reg.leave(1, 2).await.unwrap();
        assert_eq!(summary.left.len(), 1);
        assert_eq!(summary.left[0].id, 1);
        assert_eq!(summary.cancelled.len(), 1);
        assert_eq!(summary.cancelled[0].owner_id, 2);

        assert!(matches!(reg.leave(1, 2).await, Err(PartyError::NotJoined)));

        reg.leave(1, 1).await.unwrap();
        assert!(matches!(reg.status(1).await, Err(PartyError::NoParties)));
        // Owner slot is free again.
        assert!(reg.create(1, &user(2), normal(30), now()).await.is_ok());
    }

    #[tokio::test]
    async fn only_owner_deletes() {
        let reg = registry();
        reg.create(1, &user(1), normal(30), now()).await.unwrap();
        reg.join(1, &user(2), JoinTarget::Id(1), &[]).await.unwrap();
        assert!(matches!(reg.delete(1, 2).await, Err(PartyError::NotOwner)));
        assert_eq!(reg.delete(1, 1).await.unwrap().id, 1);
        assert!(matches!(reg.delete(1, 1).await, Err(PartyError::NoParties)));
    }

    #[tokio::test]
    async fn kick_rules() {
        let reg = registry();
        reg.create(1, &user(1), normal(30), now()).await.unwrap();
        reg.add_member(1, 1, "게스트", &toks("법사 본")).await.unwrap();

        assert!(matches!(reg.kick(1, 1, 1).await, Err(PartyError::CannotKickOwner)));
        assert!(matches!(reg.kick(1, 1, 5).await, Err(PartyError::MemberNotFound(5))));
        assert!(matches!(reg.kick(1, 2, 2).await, Err(PartyError::NotOwner)));

        let (removed, party) = reg.kick(1, 1, 2).await.unwrap();
        assert_eq!(removed.name, "게스트");
        assert_eq!(removed.class.as_deref(), Some("법사"));
        assert_eq!(party.members.len(), 1);
    }

    #[tokio::test]
    async fn promote_prefers_own_party() {
        let reg = registry();
        reg.create(1, &user(1), normal(30), now()).await.unwrap();
        reg.create(1, &user(2), normal(30), now()).await.unwrap();
        reg.join(1, &user(2), JoinTarget::Id(1), &[]).await.unwrap();

        assert_eq!(reg.promote(1, 2).await.unwrap().owner_id, 2);
        reg.delete(1, 2).await.unwrap();
        assert_eq!(reg.promote(1, 2).await.unwrap().owner_id, 1);
        assert!(matches!(reg.promote(1, 3).await, Err(PartyError::NotJoined)));
    }

    #[tokio::test]
    async fn timer_after_delete_is_noop() {
        let reg = registry();
        let party = reg.create(1, &user(1), normal(30), now()).await.unwrap();
        let key = timer_key(&party);
        reg.delete(1, 1).await.unwrap();
        assert!(reg.fire(key).await.is_none());

        // A new party reusing id 1 is not hit by the old key.
        let newer = reg.create(1, &user(1), normal(30), now()).await.unwrap();
        assert_eq!(newer.id, 1);
        assert!(reg.fire(key).await.is_none());
        assert!(reg.fire(timer_key(&newer)).await.is_some());
    }

    #[tokio::test]
    async fn due_party_is_announced_and_removed() {
        let (reg, due) = PartyRegistry::new(PartyConfig::default());
        let reg = Arc::new(reg);
        let announcer = Arc::new(RecordingAnnouncer::default());
        tokio::spawn(run_timer_loop(reg.clone(), due, announcer.clone()));

        // Pretend "now" was almost an hour ago so the hour-long party is due shortly.
        let earlier = now() - Duration::minutes(60) + Duration::milliseconds(50);
        reg.create(7, &user(1), normal(60), earlier).await.unwrap();
        let cancelled_start = now() - Duration::minutes(60) + Duration::milliseconds(50);
        reg.create(7, &user(2), normal(60), cancelled_start).await.unwrap();
        reg.delete(7, 2).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(400)).await;

        let sent = announcer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 7);
        assert!(sent[0].1.contains("user1"));
        assert!(matches!(reg.status(7).await, Err(PartyError::NoParties)));
    }
}
