//! Record schemas for Luogu payloads
//!
//! Field names follow the wire format (camelCase). Fields are read-only
//! unless the service accepts them back in an edit or create request.

use schema::{Descriptor, Probe, Record, Registry, SchemaBuilder, UnionDescriptor};

/// Problem providers are either a user or a team. The wire format has no
/// tag: user objects carry `uid`, team objects do not.
pub fn provider() -> Descriptor {
    Descriptor::union(
        UnionDescriptor::new()
            .variant("user", "UserSummary", Probe::has_key("uid"))
            .variant("team", "Team", Probe::Always),
    )
}

/// Sample cases as `(input, output)` pairs.
fn samples() -> Descriptor {
    Descriptor::list(Descriptor::tuple([Descriptor::string(), Descriptor::string()]))
}

/// Build the registry of every record type the wrappers decode.
pub fn registry() -> schema::Result<Registry> {
    Registry::builder()
        // --- users and teams ---
        .schema(
            SchemaBuilder::new("UserSummary")
                .field("uid", Descriptor::int())
                .field("name", Descriptor::string())
                .field("slogan", Descriptor::string())
                .field("badge", Descriptor::string())
                .field("isAdmin", Descriptor::bool())
                .field("isBanned", Descriptor::bool())
                .field("color", Descriptor::string())
                .field("ccfLevel", Descriptor::int())
                .field("avatar", Descriptor::string()),
        )
        .schema(
            SchemaBuilder::new("UserDetails")
                .extends("UserSummary")
                .field("followingCount", Descriptor::int())
                .field("followerCount", Descriptor::int())
                .field("ranking", Descriptor::int())
                .field("registerTime", Descriptor::int())
                .field("introduction", Descriptor::string())
                .field("passedProblemCount", Descriptor::int())
                .field("submittedProblemCount", Descriptor::int())
                .field("prize", Descriptor::list(Descriptor::any())),
        )
        .schema(SchemaBuilder::new("UserDataResponse").field("user", Descriptor::record("UserDetails")))
        .schema(
            SchemaBuilder::new("UserPage")
                .field("result", Descriptor::list(Descriptor::record("UserDetails")))
                .field("count", Descriptor::int())
                .field("perPage", Descriptor::int()),
        )
        .schema(SchemaBuilder::new("UserListResponse").field("users", Descriptor::record("UserPage")))
        .schema(
            SchemaBuilder::new("UserSearchResponse")
                .field("users", Descriptor::list(Descriptor::record("UserSummary"))),
        )
        .schema(
            SchemaBuilder::new("Team")
                .field("id", Descriptor::int())
                .field("name", Descriptor::string())
                .field("isPremium", Descriptor::bool()),
        )
        // --- tags ---
        .schema(
            SchemaBuilder::new("Tag")
                .field("id", Descriptor::int())
                .field("name", Descriptor::string())
                .field("type", Descriptor::int())
                .field("parent", Descriptor::int()),
        )
        .schema(
            SchemaBuilder::new("TagsResponse")
                .field("tags", Descriptor::list(Descriptor::record("Tag")))
                .field("types", Descriptor::list(Descriptor::any()))
                .field("version", Descriptor::int()),
        )
        // --- problems ---
        .schema(
            SchemaBuilder::new("ProblemSummary")
                .field("pid", Descriptor::string())
                .field("title", Descriptor::string())
                .field("difficulty", Descriptor::int())
                .field("type", Descriptor::string())
                .field("tags", Descriptor::list(Descriptor::int()))
                .field("wantsTranslation", Descriptor::bool())
                .field("totalSubmit", Descriptor::int())
                .field("totalAccepted", Descriptor::int())
                .field("flag", Descriptor::int())
                .field("fullScore", Descriptor::int())
                .field("accepted", Descriptor::bool())
                .field("submitted", Descriptor::bool()),
        )
        .schema(
            SchemaBuilder::new("ProblemPage")
                .field("result", Descriptor::list(Descriptor::record("ProblemSummary")))
                .field("count", Descriptor::int())
                .field("perPage", Descriptor::int()),
        )
        .schema(SchemaBuilder::new("ProblemListResponse").field("problems", Descriptor::record("ProblemPage")))
        .schema(
            SchemaBuilder::new("ProblemContent")
                .field("name", Descriptor::string())
                .field("background", Descriptor::string())
                .field("description", Descriptor::string())
                .field("formatI", Descriptor::string())
                .field("formatO", Descriptor::string())
                .field("hint", Descriptor::string())
                .field("locale", Descriptor::string()),
        )
        .schema(
            SchemaBuilder::new("ProblemLimits")
                .field("time", Descriptor::list(Descriptor::int()))
                .field("memory", Descriptor::list(Descriptor::int())),
        )
        .schema(
            SchemaBuilder::new("Problem")
                .extends("ProblemSummary")
                .field("content", Descriptor::record("ProblemContent"))
                .field("samples", samples())
                .field("limits", Descriptor::record("ProblemLimits"))
                .field("provider", provider())
                .field("stdCode", Descriptor::string())
                .field("translation", Descriptor::string())
                .field("acceptSolution", Descriptor::bool())
                .field("canEdit", Descriptor::bool()),
        )
        .schema(
            SchemaBuilder::new("ProblemDataResponse")
                .field("problem", Descriptor::record("Problem"))
                .field("contest", Descriptor::any())
                .field("bookmarked", Descriptor::bool())
                .field("vjudgeUsername", Descriptor::string())
                .field("lastLanguage", Descriptor::int())
                .field("lastCode", Descriptor::string())
                .field("recommendations", Descriptor::list(Descriptor::record("ProblemSummary"))),
        )
        // --- problem editing ---
        .schema(
            SchemaBuilder::new("ProblemSettings")
                .writable("title", Descriptor::string())
                .writable("background", Descriptor::string())
                .writable("description", Descriptor::string())
                .writable("inputFormat", Descriptor::string())
                .writable("outputFormat", Descriptor::string())
                .writable("hint", Descriptor::string())
                .writable("samples", samples())
                .writable("translation", Descriptor::string())
                .writable("needsTranslation", Descriptor::bool())
                .writable("acceptSolution", Descriptor::bool())
                .writable("allowDataDownload", Descriptor::bool())
                .writable("tags", Descriptor::list(Descriptor::int()))
                .writable("difficulty", Descriptor::int())
                .writable("showScore", Descriptor::bool())
                .writable("providerID", Descriptor::int())
                .writable("comment", Descriptor::string()),
        )
        .schema(
            SchemaBuilder::new("TestCase")
                .writable("upid", Descriptor::int())
                .writable("inputFileName", Descriptor::string())
                .writable("outputFileName", Descriptor::string())
                .writable("timeLimit", Descriptor::int())
                .writable("memoryLimit", Descriptor::int())
                .writable("fullScore", Descriptor::int())
                .writable("isPretest", Descriptor::bool())
                .writable("subtaskId", Descriptor::int()),
        )
        .schema(
            SchemaBuilder::new("TestCaseSettings")
                .writable("cases", Descriptor::list(Descriptor::record("TestCase")))
                .writable("scoringStrategy", Descriptor::any())
                .writable("subtaskScoringStrategies", Descriptor::int_keyed_map(Descriptor::any()))
                .writable("showSubtask", Descriptor::bool()),
        )
        .schema(
            SchemaBuilder::new("ProblemSettingsResponse")
                .field("problemDetails", Descriptor::record("Problem"))
                .field("problemSettings", Descriptor::record("ProblemSettings"))
                .field("testCaseSettings", Descriptor::record("TestCaseSettings"))
                .field("privilegedTeams", Descriptor::list(Descriptor::record("Team"))),
        )
        .schema(SchemaBuilder::new("ProblemModifiedResponse").field("pid", Descriptor::string()))
        // --- query parameters ---
        .schema(
            SchemaBuilder::new("ListParams")
                .writable("page", Descriptor::int())
                .writable("orderBy", Descriptor::int())
                .writable("keyword", Descriptor::string())
                .writable("order", Descriptor::string())
                .writable("type", Descriptor::string()),
        )
        .schema(
            SchemaBuilder::new("ProblemListParams")
                .extends("ListParams")
                .writable("content", Descriptor::bool())
                .writable("difficulty", Descriptor::int())
                .writable("tag", Descriptor::string()),
        )
        .schema(
            SchemaBuilder::new("UserListParams")
                .extends("ListParams")
                .writable("user", Descriptor::int()),
        )
        .schema(SchemaBuilder::new("UserSearchParams").writable("keyword", Descriptor::string()))
        .build()
}

/// Empty paging parameters.
pub fn list_params() -> Record {
    Record::new("ListParams")
}

/// Empty problem-list filter.
pub fn problem_list_params() -> Record {
    Record::new("ProblemListParams")
}
