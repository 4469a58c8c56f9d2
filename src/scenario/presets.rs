//! Built-in scenarios.

use super::{CodeExecutionSpec, ParticipantKind, ParticipantSpec, Scenario, TerminationSpec};
use crate::agent::HumanInputMode;
use crate::groupchat::SelectionMethod;

/// Names of the built-in scenarios with a one-line description.
pub const PRESETS: &[(&str, &str)] = &[
    (
        "product-team",
        "user proxy, product manager and a memory-augmented coder design an app",
    ),
    (
        "research-team",
        "admin, planner, engineer, scientist, executor and critic survey recent papers",
    ),
    (
        "assistant",
        "an assistant works on a task while an automatic user proxy runs its code",
    ),
];

/// Look up a built-in scenario by name.
pub fn preset(name: &str) -> Option<Scenario> {
    match name {
        "product-team" => Some(product_team()),
        "research-team" => Some(research_team()),
        "assistant" => Some(assistant()),
        _ => None,
    }
}

pub fn names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|(name, _)| *name)
}

fn proxy(name: &str, system_prompt: &str, mode: HumanInputMode) -> ParticipantSpec {
    ParticipantSpec {
        human_input_mode: Some(mode),
        ..ParticipantSpec::new(name, ParticipantKind::HumanProxy, system_prompt)
    }
}

fn assistant_spec(name: &str, system_prompt: &str) -> ParticipantSpec {
    ParticipantSpec::new(name, ParticipantKind::Assistant, system_prompt)
}

/// Product manager and coder brainstorm with a human admin.
pub fn product_team() -> Scenario {
    let user = ParticipantSpec {
        default_auto_reply: Some("...".into()),
        code_execution: Some(CodeExecutionSpec {
            work_dir: "groupchat".into(),
            last_n_messages: 2,
            timeout_secs: None,
        }),
        ..proxy("User_proxy", "A human admin.", HumanInputMode::Terminate)
    };
    let pm = ParticipantSpec {
        default_auto_reply: Some("...".into()),
        ..assistant_spec("Product_manager", "Creative in software product ideas.")
    };
    let coder = ParticipantSpec {
        default_auto_reply: Some("...".into()),
        ..ParticipantSpec::new(
            "MemGPT_coder",
            ParticipantKind::Memory,
            "I am a 10x engineer, trained in Python. I was the first engineer at Uber \
             (which I make sure to tell everyone I work with).\n\
             You are participating in a group chat with a user (User_proxy) \
             and a product manager (Product_manager).",
        )
    };

    Scenario {
        name: "product-team".into(),
        max_rounds: 12,
        selection: SelectionMethod::RoundRobin,
        termination: None,
        initiator: "User_proxy".into(),
        message: "I want to design an app to make me one million dollars in one month. \
                  Yes, your heard that right."
            .into(),
        temperature: None,
        timeout_secs: None,
        participants: vec![user, pm, coder],
    }
}

/// Planned research with code execution and review.
pub fn research_team() -> Scenario {
    let admin = proxy(
        "Admin",
        "A human admin. Interact with the planner to discuss the plan. \
         Plan execution needs to be approved by this admin.",
        HumanInputMode::Always,
    );
    let engineer = assistant_spec(
        "Engineer",
        "Engineer. You follow an approved plan. You write python/shell code to solve tasks. \
         Wrap the code in a code block that specifies the script type. The user can't modify \
         your code. So do not suggest incomplete code which requires others to modify. Don't use \
         a code block if it's not intended to be executed by the executor.\n\
         Don't include multiple code blocks in one response. Do not ask others to copy and paste \
         the result. Check the execution result returned by the executor.\n\
         If the result indicates there is an error, fix the error and output the code again. \
         Suggest the full code instead of partial code or code changes. If the error can't be \
         fixed or if the task is not solved even after the code is executed successfully, analyze \
         the problem, revisit your assumption, collect additional info you need, and think of a \
         different approach to try.",
    );
    let scientist = assistant_spec(
        "Scientist",
        "Scientist. You follow an approved plan. You are able to categorize papers after seeing \
         their abstracts printed. You don't write code.",
    );
    let planner = assistant_spec(
        "Planner",
        "Planner. Suggest a plan. Revise the plan based on feedback from admin and critic, until \
         admin approval.\n\
         The plan may involve an engineer who can write code and a scientist who doesn't write \
         code.\n\
         Explain the plan first. Be clear which step is performed by an engineer, and which step \
         is performed by a scientist.",
    );
    let executor = ParticipantSpec {
        code_execution: Some(CodeExecutionSpec {
            work_dir: "paper".into(),
            last_n_messages: 3,
            timeout_secs: None,
        }),
        ..proxy(
            "Executor",
            "Executor. Execute the code written by the engineer and report the result.",
            HumanInputMode::Never,
        )
    };
    let critic = assistant_spec(
        "Critic",
        "Critic. Double check plan, claims, code from other agents and provide feedback. \
         Check whether the plan includes adding verifiable info such as source URL.",
    );

    Scenario {
        name: "research-team".into(),
        max_rounds: 50,
        selection: SelectionMethod::Auto,
        termination: None,
        initiator: "Admin".into(),
        message: "find papers on LLM applications from arxiv in the last week, \
                  create a markdown table of different domains."
            .into(),
        temperature: Some(0.0),
        timeout_secs: Some(120),
        participants: vec![admin, engineer, scientist, planner, executor, critic],
    }
}

/// One assistant and an automatic user proxy that runs its code.
pub fn assistant() -> Scenario {
    let user_proxy = ParticipantSpec {
        max_consecutive_auto_reply: Some(10),
        code_execution: Some(CodeExecutionSpec {
            work_dir: "_output".into(),
            last_n_messages: 1,
            timeout_secs: None,
        }),
        use_llm: true,
        ..proxy(
            "user_proxy",
            "Reply TERMINATE if the task has been solved at full satisfaction. \
             Otherwise, reply CONTINUE, or the reason why the task is not solved yet",
            HumanInputMode::Never,
        )
    };

    Scenario {
        name: "assistant".into(),
        max_rounds: 30,
        selection: SelectionMethod::RoundRobin,
        termination: Some(TerminationSpec::EndsWith("TERMINATE".into())),
        initiator: "user_proxy".into(),
        message: "Search for the API of some weather service, and write a Python script that \
                  uses the API to get the current weather for a given city. And bring me back \
                  the weather of the city of Buenos Aires."
            .into(),
        temperature: Some(0.0),
        timeout_secs: Some(600),
        participants: vec![user_proxy, assistant_spec("assistant", "Helpful assistant")],
    }
}
