use ahash::AHashMap;
use log::{debug, trace};

use crate::physics::activity_events::{ActivityEvent, ActivityEventKind, ActivityEvents};
use crate::physics::body_properties::IBodyActivitySource;
use crate::physics::deactivation_manager_split::SplitScratch;
use crate::physics::deactivation_settings::DeactivationSettings;
use crate::physics::errors::{DeactivationError, Result};
use crate::physics::handles::{BodyHandle, ConnectionHandle, IslandHandle, MemberHandle};
use crate::physics::simulation_island::{find_root, SimulationIsland};
use crate::physics::simulation_island_connection::SimulationIslandConnection;
use crate::physics::simulation_island_member::{SearchState, SimulationIslandMember};
use crate::utilities::memory::managed_id_pool::ManagedIdPool;
use crate::utilities::thread_dispatcher::IThreadDispatcher;

/// Keeps islands equal to the connected components of the member graph and decides which of them may sleep.
///
/// Members, connections and islands live in arenas addressed by handles. Graph mutation (merging, splitting,
/// sleeping) requires `&mut self` and is strictly sequential; the candidacy pass is the only part that runs on
/// multiple threads, and it only touches the per-member locked fields and the island parent links.
pub struct DeactivationManager {
    settings: DeactivationSettings,

    pub(crate) members: Vec<Option<SimulationIslandMember>>,
    member_id_pool: ManagedIdPool,
    body_to_member: AHashMap<BodyHandle, MemberHandle>,

    pub(crate) connections: Vec<Option<SimulationIslandConnection>>,
    connection_id_pool: ManagedIdPool,
    pending_additions: Vec<ConnectionHandle>,
    pending_removals: Vec<ConnectionHandle>,

    pub(crate) islands: Vec<SimulationIsland>,
    island_id_pool: ManagedIdPool,
    /// Every island in use, including emptied orphans that have not been reclaimed yet.
    pub(crate) island_list: Vec<IslandHandle>,
    /// Position in `island_list` where the next sleep pass resumes.
    pub(crate) sleep_cursor: usize,

    pub(crate) split_scratch: SplitScratch,
    pub(crate) events: ActivityEvents,
}

impl DeactivationManager {
    pub fn new(settings: DeactivationSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            members: Vec::new(),
            member_id_pool: ManagedIdPool::new(64),
            body_to_member: AHashMap::new(),
            connections: Vec::new(),
            connection_id_pool: ManagedIdPool::new(64),
            pending_additions: Vec::new(),
            pending_removals: Vec::new(),
            islands: Vec::new(),
            island_id_pool: ManagedIdPool::new(16),
            island_list: Vec::new(),
            sleep_cursor: 0,
            split_scratch: SplitScratch::default(),
            events: ActivityEvents::new(),
        })
    }

    #[inline(always)]
    pub fn settings(&self) -> &DeactivationSettings {
        &self.settings
    }

    /// Replaces the settings after validating them. The previous settings are kept on failure.
    pub fn set_settings(&mut self, settings: DeactivationSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Runs the per-frame activity work: pending connection changes are applied, then every member's candidacy is
    /// reevaluated, then a bounded number of islands are considered for sleep.
    pub fn update<B: IBodyActivitySource + ?Sized>(
        &mut self,
        dt: f32,
        bodies: &B,
        thread_dispatcher: Option<&dyn IThreadDispatcher>,
    ) -> Result<()> {
        if !(dt > 0.0) {
            return Err(DeactivationError::InvalidTimestep(dt));
        }
        self.flush_pending_connections();
        self.update_candidacy(dt, bodies, thread_dispatcher);
        // Orphan reclamation in the sleep pass relies on the candidacy pass having compressed every member's island
        // reference to its root, so the two always run back to back.
        self.sleep_pass();
        Ok(())
    }

    //
    // Members
    //

    /// Registers a body with the manager. Dynamic members join (and merge) the islands of their connected
    /// neighbors, or get a fresh singleton island. Kinematic members never get an island.
    pub fn add_member(&mut self, body: BodyHandle, is_dynamic: bool) -> Result<MemberHandle> {
        if self.body_to_member.contains_key(&body) {
            return Err(DeactivationError::AlreadyManagedBody(body));
        }
        let handle = MemberHandle(self.member_id_pool.take());
        let index = handle.index();
        if index >= self.members.len() {
            self.members.resize_with(index + 1, || None);
        }
        debug_assert!(self.members[index].is_none(), "Member slots handed out by the pool must be empty.");
        self.members[index] = Some(SimulationIslandMember::new(body, is_dynamic));
        self.body_to_member.insert(body, handle);
        if is_dynamic {
            self.add_to_island(handle);
        }
        trace!("Added {} for {} (dynamic: {})", handle, body, is_dynamic);
        Ok(handle)
    }

    /// Removes a member along with every connection touching it. Returns the body the member tracked.
    ///
    /// The member may have been the only path between parts of its island, so split attempts are made between one
    /// representative of each removed connection.
    pub fn remove_member(&mut self, member: MemberHandle) -> Result<BodyHandle> {
        let owner = self.member_ref(member)?.owner;
        let previous_island = self.detach_from_island(member);

        let connections = std::mem::take(&mut self.member_mut_unchecked(member).connections);
        for &connection in &connections {
            self.connection_mut_unchecked(connection).slated_for_removal = true;
        }
        let representatives = self.choose_representatives(member, &connections);
        for &connection in &connections {
            self.unlink_connection(connection, Some(member));
            self.free_connection(connection);
        }
        self.drop_pending_involving(member);

        let mut touched: Vec<IslandHandle> = previous_island.into_iter().collect();
        touched.extend(representatives.iter().filter_map(|&r| self.root_of(r)));
        self.activate_islands(&touched);
        self.split_between(&representatives);

        self.body_to_member.remove(&owner);
        self.members[member.index()] = None;
        self.member_id_pool.return_id(member.0);
        trace!("Removed {} for {}", member, owner);
        Ok(owner)
    }

    /// Changes the mass category of a member. A member turning kinematic leaves its island but keeps its
    /// connections, becoming a dead end for connectivity. A member turning dynamic runs the same island
    /// assignment as a newly added dynamic member.
    pub fn set_member_dynamic(&mut self, member: MemberHandle, is_dynamic: bool) -> Result<()> {
        if self.member_ref(member)?.is_dynamic == is_dynamic {
            return Ok(());
        }
        let owner = self.member_ref(member)?.owner;
        if is_dynamic {
            let member_mut = self.member_mut_unchecked(member);
            member_mut.is_dynamic = true;
            let activity = member_mut.activity.get_mut();
            let transition = activity.reset();
            let was_active = std::mem::replace(&mut activity.is_active, true);
            if let Some(kind) = transition {
                self.events.push(member, owner, kind);
            }
            if !was_active {
                self.events.push(member, owner, ActivityEventKind::Activated);
            }
            self.add_to_island(member);
        } else {
            let previous_island = self.detach_from_island(member);
            let member_mut = self.member_mut_unchecked(member);
            member_mut.is_dynamic = false;
            let activity = member_mut.activity.get_mut();
            let transition = activity.reset();
            let was_active = std::mem::replace(&mut activity.is_active, true);
            if let Some(kind) = transition {
                self.events.push(member, owner, kind);
            }
            if !was_active {
                self.events.push(member, owner, ActivityEventKind::Activated);
            }

            let connections = self.member_ref(member)?.connections.clone();
            let representatives = self.choose_representatives(member, &connections);
            let mut touched: Vec<IslandHandle> = previous_island.into_iter().collect();
            touched.extend(representatives.iter().filter_map(|&r| self.root_of(r)));
            self.activate_islands(&touched);
            self.split_between(&representatives);
        }
        debug!("{} is now {}", member, if is_dynamic { "dynamic" } else { "kinematic" });
        Ok(())
    }

    /// Marks a member as always active. Always active members never become deactivation candidates,
    /// which keeps their whole island awake.
    pub fn set_always_active(&mut self, member: MemberHandle, always_active: bool) -> Result<()> {
        let member_mut = self.member_mut(member)?;
        member_mut.is_always_active = always_active;
        if always_active {
            let owner = member_mut.owner;
            if let Some(kind) = member_mut.activity.get_mut().reset() {
                self.events.push(member, owner, kind);
            }
            self.activate(member)?;
        }
        Ok(())
    }

    //
    // Connections
    //

    /// Adds a connection between members and merges every island it touches into one.
    /// Kinematic members are recorded on the connection but contribute no connectivity.
    pub fn add_connection(&mut self, members: &[MemberHandle]) -> Result<ConnectionHandle> {
        let handle = self.allocate_connection(members)?;
        self.link_connection(handle);
        Ok(handle)
    }

    /// Removes a connection, attempting a split between every pair of its members.
    pub fn remove_connection(&mut self, connection: ConnectionHandle) -> Result<()> {
        if !self.connection_ref(connection)?.is_linked {
            // Never made it into the graph; cancel the pending addition.
            self.pending_additions.retain(|&pending| pending != connection);
            self.pending_removals.retain(|&pending| pending != connection);
            self.free_connection(connection);
            return Ok(());
        }
        self.pending_removals.retain(|&pending| pending != connection);
        self.apply_removal(connection);
        Ok(())
    }

    /// Reserves a connection that will be added to the graph by the next flush.
    pub fn enqueue_add_connection(&mut self, members: &[MemberHandle]) -> Result<ConnectionHandle> {
        let handle = self.allocate_connection(members)?;
        self.pending_additions.push(handle);
        Ok(handle)
    }

    /// Queues a connection for removal by the next flush.
    pub fn enqueue_remove_connection(&mut self, connection: ConnectionHandle) -> Result<()> {
        self.connection_ref(connection)?;
        self.pending_removals.push(connection);
        Ok(())
    }

    /// Applies queued connection changes: every addition first, then every removal.
    /// Returns the number of changes applied.
    pub fn flush_pending_connections(&mut self) -> usize {
        let additions = std::mem::take(&mut self.pending_additions);
        let mut removals = std::mem::take(&mut self.pending_removals);
        removals.sort_unstable();
        removals.dedup();
        for &connection in &additions {
            self.link_connection(connection);
        }
        for &connection in &removals {
            match self.connections.get(connection.index()) {
                Some(Some(_)) => self.apply_removal(connection),
                _ => debug_assert!(false, "Pending removals are dropped when their connection is freed."),
            }
        }
        let applied = additions.len() + removals.len();
        if applied > 0 {
            debug!(
                "Flushed {} connection additions and {} removals",
                additions.len(),
                removals.len()
            );
        }
        applied
    }

    /// Gets the number of queued connection changes.
    pub fn pending_connection_change_count(&self) -> usize {
        self.pending_additions.len() + self.pending_removals.len()
    }

    fn allocate_connection(&mut self, members: &[MemberHandle]) -> Result<ConnectionHandle> {
        for &member in members {
            self.member_ref(member)?;
        }
        let handle = ConnectionHandle(self.connection_id_pool.take());
        let index = handle.index();
        if index >= self.connections.len() {
            self.connections.resize_with(index + 1, || None);
        }
        self.connections[index] = Some(SimulationIslandConnection::new(members.to_vec()));
        Ok(handle)
    }

    fn link_connection(&mut self, connection: ConnectionHandle) {
        let connection_mut = self.connection_mut_unchecked(connection);
        connection_mut.is_linked = true;
        let distinct = connection_mut.distinct_members();

        let mut roots: Vec<IslandHandle> = Vec::with_capacity(distinct.len());
        let mut wake = false;
        for &member in &distinct {
            let member_mut = self.member_mut_unchecked(member);
            member_mut.connections.push(connection);
            if !member_mut.is_dynamic && member_mut.activity.get_mut().is_active {
                wake = true;
            }
            if let Some(root) = self.root_of(member) {
                if !roots.contains(&root) {
                    wake |= self.islands[root.index()].is_active;
                    roots.push(root);
                }
            }
        }

        let mut roots = roots.into_iter();
        if let Some(first) = roots.next() {
            let merged = roots.fold(first, |target, root| self.merge_islands(target, root));
            if wake {
                self.activate_island(merged);
            }
        }
    }

    fn apply_removal(&mut self, connection: ConnectionHandle) {
        let connection_mut = self.connection_mut_unchecked(connection);
        connection_mut.slated_for_removal = true;
        let distinct = connection_mut.distinct_members();

        let touched: Vec<IslandHandle> = distinct.iter().filter_map(|&m| self.root_of(m)).collect();
        self.activate_islands(&touched);
        self.split_between(&distinct);

        self.unlink_connection(connection, None);
        self.free_connection(connection);
    }

    /// Removes the connection from the connection lists of its members, optionally skipping one member whose list
    /// has already been taken.
    fn unlink_connection(&mut self, connection: ConnectionHandle, skip: Option<MemberHandle>) {
        let distinct = self.connection_mut_unchecked(connection).distinct_members();
        for member in distinct {
            if Some(member) == skip {
                continue;
            }
            self.member_mut_unchecked(member).remove_connection(connection);
        }
    }

    fn free_connection(&mut self, connection: ConnectionHandle) {
        self.connections[connection.index()] = None;
        self.connection_id_pool.return_id(connection.0);
        self.pending_removals.retain(|&pending| pending != connection);
    }

    fn drop_pending_involving(&mut self, member: MemberHandle) {
        let mut index = 0;
        while index < self.pending_additions.len() {
            let connection = self.pending_additions[index];
            if self.connection_mut_unchecked(connection).members.contains(&member) {
                self.pending_additions.swap_remove(index);
                self.free_connection(connection);
            } else {
                index += 1;
            }
        }
    }

    /// Picks, for every connection, one member other than `removed` that still belongs to an island.
    fn choose_representatives(
        &self,
        removed: MemberHandle,
        connections: &[ConnectionHandle],
    ) -> Vec<MemberHandle> {
        let mut representatives = Vec::with_capacity(connections.len());
        for &connection in connections {
            if let Some(Some(connection)) = self.connections.get(connection.index()) {
                let representative = connection
                    .members
                    .iter()
                    .copied()
                    .find(|&m| m != removed && self.root_of(m).is_some());
                if let Some(representative) = representative {
                    if !representatives.contains(&representative) {
                        representatives.push(representative);
                    }
                }
            }
        }
        representatives
    }

    fn split_between(&mut self, members: &[MemberHandle]) {
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                self.try_split(members[i], members[j]);
            }
        }
    }

    //
    // Islands
    //

    /// Gets the live island of a member, or `None` for kinematic members.
    pub(crate) fn root_of(&self, member: MemberHandle) -> Option<IslandHandle> {
        let island = self.members.get(member.index())?.as_ref()?.island.load()?;
        Some(find_root(&self.islands, island))
    }

    pub(crate) fn allocate_island(&mut self, is_active: bool) -> IslandHandle {
        let handle = IslandHandle(self.island_id_pool.take());
        let index = handle.index();
        if index == self.islands.len() {
            self.islands.push(SimulationIsland::new(handle));
        }
        self.islands[index].reset(handle, is_active);
        self.island_list.push(handle);
        handle
    }

    /// Returns an emptied island to the pool. The caller is responsible for removing it from the island list.
    pub(crate) fn release_island(&mut self, island: IslandHandle) {
        let island_mut = &mut self.islands[island.index()];
        debug_assert!(island_mut.members.is_empty(), "Only empty islands can be released.");
        island_mut.in_use = false;
        *island_mut.immediate_parent.get_mut() = island.0;
        self.island_id_pool.return_id(island.0);
    }

    /// Appends a member to a root island and points the member directly at it.
    pub(crate) fn attach_to_island(&mut self, member: MemberHandle, island: IslandHandle) {
        let index_in_island = self.islands[island.index()].members.len();
        self.islands[island.index()].members.push(member);
        let member_mut = self.member_mut_unchecked(member);
        member_mut.index_in_island = index_in_island;
        *member_mut.island.get_mut() = Some(island);
    }

    /// Swap removes a member from its root island. The member's island reference is cleared.
    pub(crate) fn remove_from_island(&mut self, member: MemberHandle, island: IslandHandle) {
        let member_mut = self.member_mut_unchecked(member);
        let index = member_mut.index_in_island;
        *member_mut.island.get_mut() = None;
        member_mut.index_in_island = usize::MAX;

        let members = &mut self.islands[island.index()].members;
        debug_assert!(members[index] == member, "Member's index in its island must be current.");
        members.swap_remove(index);
        if index < members.len() {
            let moved = members[index];
            self.member_mut_unchecked(moved).index_in_island = index;
        }
    }

    fn detach_from_island(&mut self, member: MemberHandle) -> Option<IslandHandle> {
        let root = self.root_of(member)?;
        self.remove_from_island(member, root);
        if self.islands[root.index()].members.is_empty() {
            trace!("{} is now an orphan", root);
        }
        Some(root)
    }

    /// Places a dynamic member into the island of its connected neighbors, merging any distinct neighboring
    /// islands, or into a fresh singleton island if none of its neighbors has one.
    fn add_to_island(&mut self, member: MemberHandle) {
        debug_assert!(self.root_of(member).is_none(), "Member must not already belong to an island.");
        let mut target: Option<IslandHandle> = None;
        let connection_count = self.member_mut_unchecked(member).connections.len();
        for i in 0..connection_count {
            let connection = self.member_mut_unchecked(member).connections[i];
            let neighbors = match &self.connections[connection.index()] {
                Some(connection) if !connection.slated_for_removal => connection.distinct_members(),
                _ => continue,
            };
            for neighbor in neighbors {
                if neighbor == member {
                    continue;
                }
                let Some(root) = self.root_of(neighbor) else {
                    continue;
                };
                target = Some(match target {
                    None => {
                        self.attach_to_island(member, root);
                        root
                    }
                    Some(current) => self.merge_islands(current, root),
                });
            }
        }
        match target {
            Some(island) => self.activate_island(island),
            None => {
                let island = self.allocate_island(true);
                self.attach_to_island(member, island);
                trace!("Allocated singleton {} for {}", island, member);
            }
        }
    }

    /// Merges two root islands by moving the members of the smaller into the larger. Returns the surviving root.
    ///
    /// Moved members keep their old island reference; it now leads to the survivor through the absorbed island's
    /// parent link and is compressed lazily. The absorbed island is left empty in the island list as an orphan.
    pub(crate) fn merge_islands(&mut self, a: IslandHandle, b: IslandHandle) -> IslandHandle {
        if a == b {
            return a;
        }
        let (large, small) = if self.islands[a.index()].members.len() >= self.islands[b.index()].members.len() {
            (a, b)
        } else {
            (b, a)
        };
        let moved = std::mem::take(&mut self.islands[small.index()].members);
        let small_active = self.islands[small.index()].is_active;
        let small_allows = self.islands[small.index()].allow_deactivation();
        *self.islands[small.index()].immediate_parent.get_mut() = large.0;

        let large_island = &mut self.islands[large.index()];
        let large_active = large_island.is_active;
        let large_allows = large_island.allow_deactivation.get_mut();
        *large_allows = *large_allows && small_allows;
        let start = large_island.members.len();
        large_island.members.extend_from_slice(&moved);
        for (offset, &member) in moved.iter().enumerate() {
            self.member_mut_unchecked(member).index_in_island = start + offset;
        }
        trace!("Merged {} ({} members) into {}", small, moved.len(), large);

        if small_active && !large_active {
            self.activate_island(large);
        } else if large_active && !small_active {
            for &member in &moved {
                self.wake_member(member);
            }
        }
        large
    }

    //
    // Queries
    //

    /// Gets the island currently holding a member, or `None` for kinematic members.
    pub fn island_of(&self, member: MemberHandle) -> Result<Option<IslandHandle>> {
        self.member_ref(member)?;
        Ok(self.root_of(member))
    }

    /// Gets the members of an island. Handles of absorbed islands resolve to the island that absorbed them.
    pub fn island_members(&self, island: IslandHandle) -> &[MemberHandle] {
        match self.islands.get(island.index()) {
            Some(candidate) if candidate.in_use => &self.islands[find_root(&self.islands, island).index()].members,
            _ => &[],
        }
    }

    pub fn island(&self, island: IslandHandle) -> Option<&SimulationIsland> {
        let candidate = self.islands.get(island.index())?;
        if !candidate.in_use {
            return None;
        }
        Some(&self.islands[find_root(&self.islands, island).index()])
    }

    pub fn island_is_active(&self, island: IslandHandle) -> bool {
        self.island(island).map_or(false, |island| island.is_active)
    }

    pub fn allow_deactivation(&self, island: IslandHandle) -> bool {
        self.island(island).map_or(false, |island| island.allow_deactivation())
    }

    /// Gets the number of islands the manager is tracking, including orphans awaiting reclamation.
    #[inline(always)]
    pub fn island_count(&self) -> usize {
        self.island_list.len()
    }

    /// Gets the islands that currently hold members.
    pub fn occupied_islands(&self) -> Vec<IslandHandle> {
        self.island_list
            .iter()
            .copied()
            .filter(|&island| !self.islands[island.index()].members.is_empty())
            .collect()
    }

    /// Gets the number of islands that hold members and are awake.
    pub fn active_island_count(&self) -> usize {
        self.island_list
            .iter()
            .filter(|&&island| {
                let island = &self.islands[island.index()];
                island.is_active && !island.members.is_empty()
            })
            .count()
    }

    #[inline(always)]
    pub fn member_count(&self) -> usize {
        self.body_to_member.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|connection| matches!(connection, Some(connection) if connection.is_linked))
            .count()
    }

    pub fn member(&self, member: MemberHandle) -> Option<&SimulationIslandMember> {
        self.members.get(member.index())?.as_ref()
    }

    pub fn member_for_body(&self, body: BodyHandle) -> Option<MemberHandle> {
        self.body_to_member.get(&body).copied()
    }

    pub fn body_of(&self, member: MemberHandle) -> Result<BodyHandle> {
        Ok(self.member_ref(member)?.owner)
    }

    pub fn connection(&self, connection: ConnectionHandle) -> Option<&SimulationIslandConnection> {
        self.connections.get(connection.index())?.as_ref()
    }

    pub fn connections_of(&self, member: MemberHandle) -> Result<&[ConnectionHandle]> {
        Ok(&self.member_ref(member)?.connections)
    }

    pub fn connection_members(&self, connection: ConnectionHandle) -> Result<&[MemberHandle]> {
        Ok(&self.connection_ref(connection)?.members)
    }

    pub fn is_member_active(&self, member: MemberHandle) -> Result<bool> {
        Ok(self.member_ref(member)?.is_active())
    }

    pub fn is_deactivation_candidate(&self, member: MemberHandle) -> Result<bool> {
        Ok(self.member_ref(member)?.is_deactivation_candidate())
    }

    pub fn search_state(&self, member: MemberHandle) -> Result<SearchState> {
        Ok(self.member_ref(member)?.search_state)
    }

    //
    // Events
    //

    #[inline(always)]
    pub fn events(&self) -> &ActivityEvents {
        &self.events
    }

    /// Takes every activity transition recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<ActivityEvent> {
        self.events.drain().collect()
    }

    /// Removes every member, connection and island. Settings are kept.
    pub fn clear(&mut self) {
        self.members.clear();
        self.member_id_pool.clear();
        self.body_to_member.clear();
        self.connections.clear();
        self.connection_id_pool.clear();
        self.pending_additions.clear();
        self.pending_removals.clear();
        self.islands.clear();
        self.island_id_pool.clear();
        self.island_list.clear();
        self.sleep_cursor = 0;
        self.split_scratch = SplitScratch::default();
        self.events.clear();
    }

    /// Checks the structural invariants of the graph, panicking on the first violation.
    pub fn validate(&self) {
        for (index, slot) in self.members.iter().enumerate() {
            let Some(member) = slot else {
                continue;
            };
            let handle = MemberHandle(index as i32);
            assert_eq!(
                self.body_to_member.get(&member.owner),
                Some(&handle),
                "{} must be registered under its body {}.",
                handle,
                member.owner
            );
            assert_eq!(
                member.search_state,
                SearchState::Unclaimed,
                "{} was left claimed by a split attempt.",
                handle
            );
            match self.root_of(handle) {
                Some(root) => {
                    assert!(member.is_dynamic, "Kinematic {} must not belong to an island.", handle);
                    let island = &self.islands[root.index()];
                    assert!(island.in_use, "{} belongs to {}, which is not in use.", handle, root);
                    assert_eq!(
                        island.members.get(member.index_in_island),
                        Some(&handle),
                        "{} has a stale index in {}.",
                        handle,
                        root
                    );
                    assert_eq!(
                        member.is_active(),
                        island.is_active,
                        "{} activity must mirror {}.",
                        handle,
                        root
                    );
                }
                None => assert!(!member.is_dynamic, "Dynamic {} must belong to an island.", handle),
            }
            for &connection in &member.connections {
                let connection_ref = self
                    .connection(connection)
                    .unwrap_or_else(|| panic!("{} references freed {}.", handle, connection));
                assert!(connection_ref.is_linked, "{} references unlinked {}.", handle, connection);
                assert!(
                    connection_ref.members.contains(&handle),
                    "{} references {}, which does not include it.",
                    handle,
                    connection
                );
            }
        }

        for (index, slot) in self.connections.iter().enumerate() {
            let Some(connection) = slot else {
                continue;
            };
            let handle = ConnectionHandle(index as i32);
            if !connection.is_linked {
                assert!(
                    self.pending_additions.contains(&handle),
                    "Unlinked {} must be pending.",
                    handle
                );
                continue;
            }
            assert!(!connection.slated_for_removal, "{} is slated outside of a removal.", handle);
            let mut shared_root = None;
            for &member in &connection.members {
                let member_ref = self
                    .member(member)
                    .unwrap_or_else(|| panic!("{} references removed {}.", handle, member));
                assert!(
                    member_ref.connections.contains(&handle),
                    "{} is missing from {}'s connections.",
                    handle,
                    member
                );
                if let Some(root) = self.root_of(member) {
                    match shared_root {
                        None => shared_root = Some(root),
                        Some(shared) => assert_eq!(
                            shared, root,
                            "{} joins members of different islands.",
                            handle
                        ),
                    }
                }
            }
        }

        for (index, island) in self.islands.iter().enumerate() {
            let handle = IslandHandle(index as i32);
            let listed = self.island_list.iter().filter(|&&listed| listed == handle).count();
            if island.in_use {
                assert_eq!(listed, 1, "{} must appear in the island list exactly once.", handle);
            } else {
                assert_eq!(listed, 0, "Pooled {} must not appear in the island list.", handle);
                assert!(island.members.is_empty(), "Pooled {} must be empty.", handle);
            }
            if island.parent() != handle {
                assert!(island.members.is_empty(), "Absorbed {} must be empty.", handle);
            }
            for (position, &member) in island.members.iter().enumerate() {
                assert!(
                    !island.members[..position].contains(&member),
                    "{} holds {} twice.",
                    handle,
                    member
                );
                assert_eq!(
                    self.root_of(member),
                    Some(handle),
                    "{} holds {}, which resolves elsewhere.",
                    handle,
                    member
                );
            }
        }

        let occupied_members = self.members.iter().filter(|slot| slot.is_some()).count();
        let occupied_connections = self.connections.iter().filter(|slot| slot.is_some()).count();
        let occupied_islands = self.islands.iter().filter(|island| island.in_use).count();
        for (name, pool, slots, occupied) in [
            ("member", &self.member_id_pool, self.members.len(), occupied_members),
            ("connection", &self.connection_id_pool, self.connections.len(), occupied_connections),
            ("island", &self.island_id_pool, self.islands.len(), occupied_islands),
        ] {
            assert!(
                (pool.highest_possibly_claimed_id() as i64) < slots as i64,
                "The {} pool handed out an id past the end of its storage.",
                name
            );
            assert_eq!(
                pool.claimed_id_count() as usize,
                occupied,
                "The {} pool's claimed ids must match the occupied slots.",
                name
            );
        }
    }

    //
    // Arena access
    //

    pub(crate) fn member_ref(&self, member: MemberHandle) -> Result<&SimulationIslandMember> {
        self.members
            .get(member.index())
            .and_then(|slot| slot.as_ref())
            .ok_or(DeactivationError::MemberNotManaged(member))
    }

    pub(crate) fn member_mut(&mut self, member: MemberHandle) -> Result<&mut SimulationIslandMember> {
        self.members
            .get_mut(member.index())
            .and_then(|slot| slot.as_mut())
            .ok_or(DeactivationError::MemberNotManaged(member))
    }

    fn connection_ref(&self, connection: ConnectionHandle) -> Result<&SimulationIslandConnection> {
        self.connections
            .get(connection.index())
            .and_then(|slot| slot.as_ref())
            .ok_or(DeactivationError::ConnectionNotManaged(connection))
    }

    /// Gets a member known to be registered. Panics otherwise; handles stored inside the graph are always live.
    #[inline(always)]
    pub(crate) fn member_mut_unchecked(&mut self, member: MemberHandle) -> &mut SimulationIslandMember {
        match self.members[member.index()].as_mut() {
            Some(member) => member,
            None => panic!("{} is referenced by the graph but not registered.", member),
        }
    }

    #[inline(always)]
    fn connection_mut_unchecked(&mut self, connection: ConnectionHandle) -> &mut SimulationIslandConnection {
        match self.connections[connection.index()].as_mut() {
            Some(connection) => connection,
            None => panic!("{} is referenced by the graph but not allocated.", connection),
        }
    }
}
